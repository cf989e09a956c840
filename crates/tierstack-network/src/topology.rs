//! Two-tier network topology.
//!
//! Builds, in this order: every public subnet, a static address and the NAT
//! gateway anchored in the first public subnet, one route table whose
//! default route targets that gateway, and finally every private subnet,
//! each bound to the route table as soon as it exists. Private subnets
//! therefore never egress anywhere but through the NAT gateway.

use serde::Serialize;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::{Cidr, ResourceId, SubnetTier};
use tierstack_provider::NetworkApi;
use tierstack_provider::spec::{
    NatGatewaySpec, RouteSpec, RouteTableAssociationSpec, RouteTableSpec, SubnetSpec, VpcHandle,
};

/// A created subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetDescriptor {
    /// Subnet identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
    /// Address range.
    pub cidr_block: Cidr,
    /// Placement zone.
    pub availability_zone: String,
    /// Public or private.
    pub tier: SubnetTier,
    /// Route table the subnet is bound to (private subnets only).
    pub route_table_id: Option<ResourceId>,
}

/// A subnet known to be internet-routable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicSubnet(SubnetDescriptor);

impl PublicSubnet {
    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &SubnetDescriptor {
        &self.0
    }

    /// Returns the subnet id.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.0.id
    }
}

/// A subnet bound to the NAT-routed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateSubnet {
    subnet: SubnetDescriptor,
    association: RouteTableAssociation,
}

impl PrivateSubnet {
    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &SubnetDescriptor {
        &self.subnet
    }

    /// Returns the subnet id.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.subnet.id
    }

    /// Returns the binding to the route table.
    #[must_use]
    pub const fn association(&self) -> &RouteTableAssociation {
        &self.association
    }
}

/// The single NAT gateway of a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatGatewayDescriptor {
    /// Gateway identifier.
    pub id: ResourceId,
    /// Public subnet the gateway lives in.
    pub anchored_public_subnet_id: ResourceId,
    /// Static address the gateway translates to.
    pub allocated_address_id: ResourceId,
}

/// The route table shared by every private subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTableDescriptor {
    /// Route table identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
    /// Routes in the table.
    pub routes: Vec<RouteSpec>,
}

impl RouteTableDescriptor {
    /// Returns every route matching all destinations.
    pub fn default_routes(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().filter(|r| r.destination.is_anywhere())
    }

    /// Returns the NAT gateway of the default route, if there is exactly one.
    #[must_use]
    pub fn default_route_target(&self) -> Option<&ResourceId> {
        let mut routes = self.default_routes();
        match (routes.next(), routes.next()) {
            (Some(route), None) => Some(&route.nat_gateway_id),
            _ => None,
        }
    }
}

/// Binding of a subnet to a route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTableAssociation {
    /// Association identifier.
    pub id: ResourceId,
    /// Bound route table.
    pub route_table_id: ResourceId,
    /// Bound subnet.
    pub subnet_id: ResourceId,
}

/// Where one subnet goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlacement {
    /// Address range.
    pub cidr_block: Cidr,
    /// Placement zone.
    pub availability_zone: String,
}

/// Inputs of [`build_topology`].
#[derive(Debug, Clone)]
pub struct TopologyRequest {
    /// Prefix of every resource name.
    pub name: String,
    /// Network the subnets are carved from.
    pub vpc: VpcHandle,
    /// Internet-routable blocks; the first one anchors the NAT gateway.
    pub public_cidrs: Vec<Cidr>,
    /// NAT-routed blocks.
    pub private_cidrs: Vec<Cidr>,
    /// Zones assigned to subnets round-robin, in order.
    pub availability_zones: Vec<String>,
}

/// A complete two-tier network.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    /// Network identifier.
    pub vpc_id: ResourceId,
    /// Internet-routable subnets, in request order.
    pub public_subnets: Vec<PublicSubnet>,
    /// NAT-routed subnets, in request order.
    pub private_subnets: Vec<PrivateSubnet>,
    /// The NAT gateway.
    pub nat_gateway: NatGatewayDescriptor,
    /// The private route table.
    pub route_table: RouteTableDescriptor,
}

impl Topology {
    /// Returns the public subnets as a placement set.
    ///
    /// # Errors
    ///
    /// Cannot fail for a built topology; the signature mirrors [`SubnetSet::new`].
    pub fn public_set(&self) -> Result<SubnetSet> {
        SubnetSet::new(
            self.public_subnets
                .iter()
                .map(|s| s.descriptor().clone())
                .collect(),
        )
    }

    /// Returns the private subnets as a placement set.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Topology` if the topology has no private subnets.
    pub fn private_set(&self) -> Result<SubnetSet> {
        SubnetSet::new(
            self.private_subnets
                .iter()
                .map(|s| s.descriptor().clone())
                .collect(),
        )
    }

    /// Returns every route table association.
    pub fn associations(&self) -> impl Iterator<Item = &RouteTableAssociation> {
        self.private_subnets.iter().map(PrivateSubnet::association)
    }
}

/// Non-empty set of subnets that all share one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetSet {
    tier: SubnetTier,
    subnets: Vec<SubnetDescriptor>,
}

impl SubnetSet {
    /// Groups subnets for placement.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Topology` for an empty set and
    /// `StackError::TopologyMismatch` when public and private subnets are mixed.
    pub fn new(subnets: Vec<SubnetDescriptor>) -> Result<Self> {
        let Some(first) = subnets.first() else {
            return Err(StackError::topology("subnet set is empty"));
        };
        let tier = first.tier;
        if let Some(odd) = subnets.iter().find(|s| s.tier != tier) {
            return Err(StackError::mismatch(format!(
                "subnet set mixes {tier} subnet {} with {} subnet {}",
                first.id, odd.tier, odd.id
            )));
        }
        Ok(Self { tier, subnets })
    }

    /// Returns the shared tier.
    #[must_use]
    pub const fn tier(&self) -> SubnetTier {
        self.tier
    }

    /// Returns the subnets.
    #[must_use]
    pub fn subnets(&self) -> &[SubnetDescriptor] {
        &self.subnets
    }

    /// Returns the subnet ids, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<ResourceId> {
        self.subnets.iter().map(|s| s.id.clone()).collect()
    }
}

/// Validates the request and assigns zones round-robin.
///
/// # Errors
///
/// Returns `StackError::Topology` if there is no public block or zone, a
/// block lies outside the VPC, or two blocks overlap.
pub fn plan_placements(
    request: &TopologyRequest,
) -> Result<(Vec<SubnetPlacement>, Vec<SubnetPlacement>)> {
    if request.public_cidrs.is_empty() {
        return Err(StackError::topology(
            "at least one public subnet is required to anchor the NAT gateway",
        ));
    }
    if request.availability_zones.is_empty() {
        return Err(StackError::topology("no availability zones to place subnets in"));
    }

    let all: Vec<&Cidr> = request
        .public_cidrs
        .iter()
        .chain(&request.private_cidrs)
        .collect();
    for (i, block) in all.iter().enumerate() {
        if !request.vpc.cidr_block.contains(block) {
            return Err(StackError::topology(format!(
                "{block} lies outside VPC range {}",
                request.vpc.cidr_block
            )));
        }
        if let Some(other) = all[i + 1..].iter().find(|o| o.overlaps(block)) {
            return Err(StackError::topology(format!("{block} overlaps {other}")));
        }
    }

    let zones = &request.availability_zones;
    let place = |cidrs: &[Cidr]| {
        cidrs
            .iter()
            .enumerate()
            .map(|(i, cidr)| SubnetPlacement {
                cidr_block: *cidr,
                availability_zone: zones[i % zones.len()].clone(),
            })
            .collect::<Vec<_>>()
    };
    Ok((place(&request.public_cidrs), place(&request.private_cidrs)))
}

/// Creates one internet-routable subnet.
///
/// # Errors
///
/// Returns an error if the provider rejects the subnet.
pub async fn create_public_subnet<P>(
    provider: &P,
    name: String,
    vpc: &VpcHandle,
    placement: &SubnetPlacement,
) -> Result<PublicSubnet>
where
    P: NetworkApi + ?Sized,
{
    let id = provider
        .create_subnet(&SubnetSpec {
            name: name.clone(),
            vpc_id: vpc.id.clone(),
            cidr_block: placement.cidr_block,
            availability_zone: placement.availability_zone.clone(),
            map_public_ip_on_launch: true,
        })
        .await?;
    tracing::info!(id = %id, cidr = %placement.cidr_block, zone = %placement.availability_zone, "public subnet created");
    Ok(PublicSubnet(SubnetDescriptor {
        id,
        name,
        cidr_block: placement.cidr_block,
        availability_zone: placement.availability_zone.clone(),
        tier: SubnetTier::Public,
        route_table_id: None,
    }))
}

/// Allocates a static address and anchors the NAT gateway in `anchor`.
///
/// # Errors
///
/// Returns an error if the address or gateway cannot be created.
pub async fn create_nat_gateway<P>(
    provider: &P,
    name: &str,
    anchor: &PublicSubnet,
) -> Result<NatGatewayDescriptor>
where
    P: NetworkApi + ?Sized,
{
    let allocated_address_id = provider.allocate_address(&format!("{name}-eip")).await?;
    let id = provider
        .create_nat_gateway(&NatGatewaySpec {
            name: name.into(),
            subnet_id: anchor.id().clone(),
            allocation_id: allocated_address_id.clone(),
        })
        .await?;
    tracing::info!(id = %id, subnet = %anchor.id(), "nat gateway created");
    Ok(NatGatewayDescriptor {
        id,
        anchored_public_subnet_id: anchor.id().clone(),
        allocated_address_id,
    })
}

/// Creates the route table that sends all private egress to `nat`.
///
/// # Errors
///
/// Returns an error if the provider rejects the table.
pub async fn create_route_table<P>(
    provider: &P,
    name: &str,
    vpc: &VpcHandle,
    nat: &NatGatewayDescriptor,
) -> Result<RouteTableDescriptor>
where
    P: NetworkApi + ?Sized,
{
    let routes = vec![RouteSpec {
        destination: Cidr::ANYWHERE,
        nat_gateway_id: nat.id.clone(),
    }];
    let id = provider
        .create_route_table(&RouteTableSpec {
            name: name.into(),
            vpc_id: vpc.id.clone(),
            routes: routes.clone(),
        })
        .await?;
    tracing::info!(id = %id, nat = %nat.id, "private route table created");
    Ok(RouteTableDescriptor {
        id,
        name: name.into(),
        routes,
    })
}

/// Creates one private subnet and binds it to `table`.
///
/// # Errors
///
/// Returns an error if the subnet or association cannot be created.
pub async fn create_private_subnet<P>(
    provider: &P,
    name: String,
    vpc: &VpcHandle,
    placement: &SubnetPlacement,
    table: &RouteTableDescriptor,
) -> Result<PrivateSubnet>
where
    P: NetworkApi + ?Sized,
{
    let id = provider
        .create_subnet(&SubnetSpec {
            name: name.clone(),
            vpc_id: vpc.id.clone(),
            cidr_block: placement.cidr_block,
            availability_zone: placement.availability_zone.clone(),
            map_public_ip_on_launch: false,
        })
        .await?;
    let association_id = provider
        .associate_route_table(&RouteTableAssociationSpec {
            name: format!("{name}-rta"),
            route_table_id: table.id.clone(),
            subnet_id: id.clone(),
        })
        .await?;
    tracing::info!(id = %id, cidr = %placement.cidr_block, route_table = %table.id, "private subnet created");
    Ok(PrivateSubnet {
        subnet: SubnetDescriptor {
            id: id.clone(),
            name,
            cidr_block: placement.cidr_block,
            availability_zone: placement.availability_zone.clone(),
            tier: SubnetTier::Private,
            route_table_id: Some(table.id.clone()),
        },
        association: RouteTableAssociation {
            id: association_id,
            route_table_id: table.id.clone(),
            subnet_id: id,
        },
    })
}

/// Builds the whole topology.
///
/// # Errors
///
/// Returns `StackError::Topology` for malformed inputs, or the provider's
/// error for any failed creation. Nothing is retried.
pub async fn build_topology<P>(provider: &P, request: &TopologyRequest) -> Result<Topology>
where
    P: NetworkApi + ?Sized,
{
    let (public, private) = plan_placements(request)?;
    let prefix = &request.name;

    let mut public_subnets = Vec::with_capacity(public.len());
    for (i, placement) in public.iter().enumerate() {
        public_subnets.push(
            create_public_subnet(provider, format!("{prefix}-public-{i}"), &request.vpc, placement)
                .await?,
        );
    }

    let anchor = public_subnets
        .first()
        .ok_or_else(|| StackError::topology("no public subnet to anchor the NAT gateway"))?;
    let nat_gateway = create_nat_gateway(provider, &format!("{prefix}-nat"), anchor).await?;
    let route_table = create_route_table(
        provider,
        &format!("{prefix}-private-rt"),
        &request.vpc,
        &nat_gateway,
    )
    .await?;

    let mut private_subnets = Vec::with_capacity(private.len());
    for (i, placement) in private.iter().enumerate() {
        private_subnets.push(
            create_private_subnet(
                provider,
                format!("{prefix}-private-{i}"),
                &request.vpc,
                placement,
                &route_table,
            )
            .await?,
        );
    }

    Ok(Topology {
        vpc_id: request.vpc.id.clone(),
        public_subnets,
        private_subnets,
        nat_gateway,
        route_table,
    })
}

#[cfg(test)]
mod tests {
    use tierstack_provider::MemoryProvider;
    use tierstack_provider::record::ResourceKind;

    use super::*;

    fn cidrs(blocks: &[&str]) -> Vec<Cidr> {
        blocks.iter().map(|b| b.parse().unwrap()).collect()
    }

    async fn request(provider: &MemoryProvider, public: &[&str], private: &[&str]) -> TopologyRequest {
        TopologyRequest {
            name: "infra".into(),
            vpc: provider.default_vpc().await.unwrap(),
            public_cidrs: cidrs(public),
            private_cidrs: cidrs(private),
            availability_zones: provider.availability_zones().await.unwrap(),
        }
    }

    #[tokio::test]
    async fn builds_default_two_by_two_topology() {
        let provider = MemoryProvider::new("us-east-1");
        let req = request(
            &provider,
            &["172.31.100.0/24", "172.31.101.0/24"],
            &["172.31.200.0/24", "172.31.201.0/24"],
        )
        .await;
        let topology = build_topology(&provider, &req).await.expect("build");

        assert_eq!(topology.public_subnets.len(), 2);
        assert_eq!(topology.private_subnets.len(), 2);
        assert_eq!(
            &topology.nat_gateway.anchored_public_subnet_id,
            topology.public_subnets[0].id()
        );
        assert_eq!(topology.route_table.default_routes().count(), 1);
        assert_eq!(topology.associations().count(), 2);

        assert_eq!(provider.records_of(ResourceKind::NatGateway).await.len(), 1);
        assert_eq!(provider.records_of(ResourceKind::RouteTable).await.len(), 1);
        assert_eq!(
            provider
                .records_of(ResourceKind::RouteTableAssociation)
                .await
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn every_private_subnet_routes_through_the_nat() {
        let provider = MemoryProvider::new("us-east-1");
        let req = request(
            &provider,
            &["172.31.100.0/24"],
            &["172.31.200.0/24", "172.31.201.0/24", "172.31.202.0/24"],
        )
        .await;
        let topology = build_topology(&provider, &req).await.expect("build");

        for private in &topology.private_subnets {
            assert_eq!(
                private.descriptor().route_table_id.as_ref(),
                Some(&topology.route_table.id)
            );
            assert_eq!(private.association().subnet_id, *private.id());
            assert_eq!(
                topology.route_table.default_route_target(),
                Some(&topology.nat_gateway.id)
            );
        }
        let anchor = &topology.nat_gateway.anchored_public_subnet_id;
        assert!(topology.public_subnets.iter().any(|s| s.id() == anchor));
        assert!(!topology.private_subnets.iter().any(|s| s.id() == anchor));
    }

    #[tokio::test]
    async fn zones_are_assigned_round_robin() {
        let provider = MemoryProvider::new("us-east-1")
            .with_availability_zones(vec!["us-east-1a".into(), "us-east-1b".into()]);
        let req = request(
            &provider,
            &["172.31.100.0/24", "172.31.101.0/24", "172.31.102.0/24"],
            &[],
        )
        .await;
        let (public, private) = plan_placements(&req).expect("plan");
        let zones: Vec<&str> = public.iter().map(|p| p.availability_zone.as_str()).collect();
        assert_eq!(zones, ["us-east-1a", "us-east-1b", "us-east-1a"]);
        assert!(private.is_empty());
    }

    #[tokio::test]
    async fn zero_public_subnets_fails_fast() {
        let provider = MemoryProvider::new("us-east-1");
        let req = request(&provider, &[], &["172.31.200.0/24"]).await;
        let err = build_topology(&provider, &req).await.unwrap_err();
        assert!(matches!(err, StackError::Topology { .. }), "got: {err}");
        assert!(provider.records_of(ResourceKind::Subnet).await.is_empty());
    }

    #[tokio::test]
    async fn overlapping_blocks_fail_before_any_creation() {
        let provider = MemoryProvider::new("us-east-1");
        let req = request(&provider, &["172.31.100.0/24"], &["172.31.100.128/25"]).await;
        let err = build_topology(&provider, &req).await.unwrap_err();
        assert!(matches!(err, StackError::Topology { .. }), "got: {err}");
        assert!(provider.records_of(ResourceKind::Subnet).await.is_empty());
    }

    #[tokio::test]
    async fn block_outside_vpc_is_rejected() {
        let provider = MemoryProvider::new("us-east-1");
        let req = request(&provider, &["10.0.0.0/24"], &[]).await;
        assert!(matches!(
            plan_placements(&req),
            Err(StackError::Topology { .. })
        ));
    }

    #[tokio::test]
    async fn missing_zones_is_a_topology_error() {
        let provider = MemoryProvider::new("us-east-1").with_availability_zones(Vec::new());
        let req = request(&provider, &["172.31.100.0/24"], &[]).await;
        assert!(matches!(
            plan_placements(&req),
            Err(StackError::Topology { .. })
        ));
    }

    fn descriptor(id: &str, tier: SubnetTier) -> SubnetDescriptor {
        SubnetDescriptor {
            id: ResourceId::new(id),
            name: id.into(),
            cidr_block: Cidr::ANYWHERE,
            availability_zone: "us-east-1a".into(),
            tier,
            route_table_id: None,
        }
    }

    #[test]
    fn subnet_set_rejects_mixed_tiers() {
        let err = SubnetSet::new(vec![
            descriptor("a", SubnetTier::Public),
            descriptor("b", SubnetTier::Private),
        ])
        .unwrap_err();
        assert!(matches!(err, StackError::TopologyMismatch { .. }));
    }

    #[test]
    fn subnet_set_rejects_empty() {
        assert!(matches!(
            SubnetSet::new(Vec::new()),
            Err(StackError::Topology { .. })
        ));
    }

    #[test]
    fn default_route_target_requires_exactly_one_default() {
        let route = |nat: &str| RouteSpec {
            destination: Cidr::ANYWHERE,
            nat_gateway_id: ResourceId::new(nat),
        };
        let mut table = RouteTableDescriptor {
            id: ResourceId::new("rtb-1"),
            name: "rt".into(),
            routes: vec![route("nat-1")],
        };
        assert_eq!(table.default_route_target(), Some(&ResourceId::new("nat-1")));
        table.routes.push(route("nat-2"));
        assert_eq!(table.default_route_target(), None);
    }
}
