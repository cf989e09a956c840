//! End-to-end tests for stack declaration.
//!
//! These tests drive the full pipeline against the in-memory provider:
//! 1. Network topology (subnets, NAT gateway, routing)
//! 2. Security groups (external trust, internal trust)
//! 3. Image publishing with freshly decoded registry credentials
//! 4. Load balancers and services, including the deferred API address
//! 5. Creation order of the declared resources

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use tierstack_common::config::StackConfig;
use tierstack_common::error::StackError;
use tierstack_common::types::{Cidr, SubnetTier};
use tierstack_compose::declare_stack;
use tierstack_compose::graph::creation_order;
use tierstack_image::credential::decode_token;
use tierstack_network::topology::{TopologyRequest, build_topology};
use tierstack_provider::record::{ResourceKind, ResourceRecord};
use tierstack_provider::spec::RulePeer;
use tierstack_provider::{MemoryProvider, NetworkApi};

fn cidrs(blocks: &[&str]) -> Vec<Cidr> {
    blocks.iter().map(|b| b.parse().unwrap()).collect()
}

fn position(order: &[ResourceRecord], id: &str) -> usize {
    order
        .iter()
        .position(|r| r.id.as_str() == id)
        .unwrap_or_else(|| panic!("{id} missing from plan"))
}

// ── Network topology ─────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_two_by_two_topology() {
    let provider = MemoryProvider::new("us-east-1");
    let vpc = provider.default_vpc().await.unwrap();
    let topology = build_topology(
        &provider,
        &TopologyRequest {
            name: "infra".into(),
            vpc,
            public_cidrs: cidrs(&["172.31.100.0/24", "172.31.101.0/24"]),
            private_cidrs: cidrs(&["172.31.200.0/24", "172.31.201.0/24"]),
            availability_zones: provider.availability_zones().await.unwrap(),
        },
    )
    .await
    .expect("topology");

    assert_eq!(topology.public_subnets.len(), 2);
    assert_eq!(topology.private_subnets.len(), 2);
    assert_eq!(provider.records_of(ResourceKind::NatGateway).await.len(), 1);
    assert_eq!(provider.records_of(ResourceKind::RouteTable).await.len(), 1);
    assert_eq!(topology.associations().count(), 2);
    assert_eq!(
        provider
            .records_of(ResourceKind::RouteTableAssociation)
            .await
            .len(),
        2
    );

    assert_eq!(
        &topology.nat_gateway.anchored_public_subnet_id,
        topology.public_subnets[0].id()
    );
    let routes: Vec<_> = topology.route_table.default_routes().collect();
    assert_eq!(routes.len(), 1);
    assert!(routes[0].destination.is_anywhere());
    assert_eq!(routes[0].nat_gateway_id, topology.nat_gateway.id);
}

#[tokio::test]
async fn private_subnets_egress_only_through_the_nat_gateway() {
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");
    let topology = &outputs.topology;

    let public_ids: Vec<_> = topology.public_subnets.iter().map(|s| s.id()).collect();
    let private_ids: Vec<_> = topology.private_subnets.iter().map(|s| s.id()).collect();
    let anchor = &topology.nat_gateway.anchored_public_subnet_id;
    assert!(public_ids.contains(&anchor));
    assert!(!private_ids.contains(&anchor));

    for private in &topology.private_subnets {
        let descriptor = private.descriptor();
        assert_eq!(descriptor.tier, SubnetTier::Private);
        assert_eq!(
            descriptor.route_table_id.as_ref(),
            Some(&topology.route_table.id)
        );
        assert_eq!(
            topology.route_table.default_route_target(),
            Some(&topology.nat_gateway.id)
        );
    }
}

// ── Security groups ──────────────────────────────────────────────────

#[tokio::test]
async fn internal_group_trusts_only_the_external_group() {
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");
    let groups = &outputs.security_groups;

    assert!(groups.internal.descriptor().trusts(groups.external.id()));
    assert!(!groups.internal.descriptor().has_cidr_ingress());
}

#[tokio::test]
async fn narrow_ingress_from_yaml_is_applied() {
    let yaml = r"
project: shop
external_ingress:
  - from_port: 80
    to_port: 80
    cidr: 0.0.0.0/0
";
    let config = StackConfig::from_yaml(yaml).expect("parse");
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &config)
        .await
        .expect("declare");

    let external = outputs.security_groups.external.descriptor();
    assert_eq!(external.name, "shop-external");
    let cidr_rules: Vec<_> = external
        .ingress
        .iter()
        .filter(|r| matches!(r.peer, RulePeer::Cidr(_)))
        .collect();
    assert_eq!(cidr_rules.len(), 1);
    assert_eq!((cidr_rules[0].from_port, cidr_rules[0].to_port), (80, 80));
    assert!(external.ingress.iter().any(|r| r.peer == RulePeer::SelfGroup));
}

// ── Credentials and images ───────────────────────────────────────────

#[test]
fn scenario_c_known_token_decodes() {
    let (username, password) = decode_token("QVdTOnNlY3JldA==").expect("decode");
    assert_eq!(username, "AWS");
    assert_eq!(password, "secret");
}

#[tokio::test]
async fn pushes_use_the_decoded_user_and_never_record_the_password() {
    let provider = Arc::new(
        MemoryProvider::new("us-east-1").with_authorization_token("QVdTOnNlY3JldA=="),
    );
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");
    let _ = provider.settle().await;
    let _ = outputs.resolve().await.expect("resolve");

    let images = provider.records_of(ResourceKind::Image).await;
    assert_eq!(images.len(), 2);
    for image in &images {
        assert_eq!(image.property("pushed_as"), Some("AWS"));
    }
    let snapshot = serde_json::to_string(&provider.records().await).unwrap();
    assert!(!snapshot.contains("secret"));
}

#[tokio::test]
async fn malformed_token_fails_outputs_with_invalid_credential() {
    let provider =
        Arc::new(MemoryProvider::new("us-east-1").with_authorization_token("QVdTOg=="));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declaration does not wait for credentials");
    let _ = provider.settle().await;

    let err = outputs.resolve().await.unwrap_err();
    assert!(
        matches!(err.root_cause(), StackError::InvalidCredential { .. }),
        "got: {err}"
    );
}

// ── Services ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_b_web_tier_receives_api_address() {
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");

    let address = outputs
        .web
        .service
        .env("ApiAddress")
        .expect("ApiAddress is set");
    assert!(!address.is_settled());

    let _ = provider.settle().await;
    let address = address.resolve().await.unwrap();
    assert!(address.starts_with("http://internal-"), "got: {address}");
    assert!(
        address.ends_with(".elb.amazonaws.com/WeatherForecast"),
        "got: {address}"
    );
    assert!(!address.contains(char::is_whitespace));

    let web_task = provider
        .records_of(ResourceKind::TaskDefinition)
        .await
        .into_iter()
        .find(|r| r.name == "webService-task")
        .unwrap();
    assert_eq!(web_task.property("env.ApiAddress"), Some(address.as_str()));
    assert_eq!(outputs.api_url.resolve().await.unwrap(), address);
}

#[tokio::test]
async fn tiers_are_placed_on_matching_subnets() {
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");

    assert_eq!(outputs.api.service.subnets.tier(), SubnetTier::Private);
    assert!(!outputs.api.service.assign_public_ip);
    assert_eq!(
        &outputs.api.service.security_group_id,
        outputs.security_groups.internal.id()
    );

    assert_eq!(outputs.web.service.subnets.tier(), SubnetTier::Public);
    assert!(outputs.web.service.assign_public_ip);
    assert_eq!(
        &outputs.web.service.security_group_id,
        outputs.security_groups.external.id()
    );
}

// ── Creation order ───────────────────────────────────────────────────

#[tokio::test]
async fn plan_orders_dependencies_first() {
    let provider = Arc::new(MemoryProvider::new("us-east-1"));
    let outputs = declare_stack(Arc::clone(&provider), &StackConfig::default())
        .await
        .expect("declare");
    let order = creation_order(provider.records().await).expect("acyclic");
    let topology = &outputs.topology;

    let nat = position(&order, topology.nat_gateway.id.as_str());
    assert!(position(&order, topology.public_subnets[0].id().as_str()) < nat);
    let table = position(&order, topology.route_table.id.as_str());
    assert!(nat < table);
    for association in topology.associations() {
        assert!(table < position(&order, association.id.as_str()));
    }

    let groups = &outputs.security_groups;
    assert!(
        position(&order, groups.external.id().as_str())
            < position(&order, groups.internal.id().as_str())
    );
    assert!(
        position(&order, outputs.api.load_balancer.target_group_id.as_str())
            < position(&order, outputs.api.service.id.as_str())
    );
    assert!(
        position(&order, outputs.web.service.task_definition_id.as_str())
            < position(&order, outputs.web.service.id.as_str())
    );
}
