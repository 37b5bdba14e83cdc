//! Contract Test: Section Isolation
//!
//! Sections run one after another. A failure in one section is recorded in
//! the report and never prevents the following sections from running. Each
//! named section has its own address cache entry, even when several share a
//! service.

mod common;

use common::*;
use ddupdate_core::cache::{AddressCache, MemoryAddressCache};
use ddupdate_core::{Error, IpAddress, PluginUnit, SectionConfig, SectionOutcome, UpdateEngine};
use std::net::Ipv4Addr;
use std::sync::Arc;

#[tokio::test]
async fn failing_middle_section_does_not_stop_the_run() {
    let address = IpAddress::from_v4(Ipv4Addr::new(203, 0, 113, 9));
    let first = MockServicePlugin::new("svc-one");
    let broken = MockServicePlugin::failing("svc-two");
    let third = MockServicePlugin::new("svc-three");

    let registry = registry_with(vec![
        PluginUnit::Address(Arc::new(FixedAddressPlugin::new("fixed", address))),
        PluginUnit::Service(Arc::new(MockServicePlugin::sharing_counters_with(&first))),
        PluginUnit::Service(Arc::new(MockServicePlugin::sharing_counters_with(&broken))),
        PluginUnit::Service(Arc::new(MockServicePlugin::sharing_counters_with(&third))),
    ]);
    let cache = MemoryAddressCache::new();
    let engine = UpdateEngine::new(registry, Arc::new(cache.clone()), empty_credentials());

    let sections = vec![
        SectionConfig::new("one.example.net", "fixed", "svc-one").with_name("one"),
        SectionConfig::new("two.example.net", "fixed", "svc-two").with_name("two"),
        SectionConfig::new("three.example.net", "fixed", "svc-three").with_name("three"),
    ];

    let report = engine.run(&sections).await.unwrap();

    assert_eq!(first.call_count(), 1);
    assert_eq!(broken.call_count(), 1);
    assert_eq!(third.call_count(), 1);

    let names: Vec<_> = report.sections.iter().map(|s| s.section.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    assert!(matches!(report.sections[0].result, Ok(SectionOutcome::Updated { .. })));
    assert!(matches!(report.sections[1].result, Err(Error::Registration { .. })));
    assert!(matches!(report.sections[2].result, Ok(SectionOutcome::Updated { .. })));

    // Only the successful sections were cached
    assert!(!cache.read("svc-one@one").await.unwrap().is_missing());
    assert!(cache.read("svc-two@two").await.unwrap().is_missing());
    assert!(!cache.read("svc-three@three").await.unwrap().is_missing());
}

#[tokio::test]
async fn hosts_on_one_service_keep_separate_cache_entries() {
    let address = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 44));
    let service = MockServicePlugin::new("shared");
    let registry = registry_with(vec![
        PluginUnit::Address(Arc::new(FixedAddressPlugin::new("fixed", address))),
        PluginUnit::Service(Arc::new(MockServicePlugin::sharing_counters_with(&service))),
    ]);
    let cache = MemoryAddressCache::new();
    let engine = UpdateEngine::new(registry, Arc::new(cache.clone()), empty_credentials());

    let sections = vec![
        SectionConfig::new("a.example.net", "fixed", "shared").with_name("a"),
        SectionConfig::new("b.example.net", "fixed", "shared").with_name("b"),
    ];

    let report = engine.run(&sections).await.unwrap();
    assert_eq!(report.updated(), 2);
    assert_eq!(cache.len().await, 2);

    // Fresh entries inhibit both hosts
    let report = engine.run(&sections).await.unwrap();
    assert_eq!(report.updated(), 0);

    // Once the lifetime has passed, both hosts are registered again
    for key in ["shared@a", "shared@b"] {
        cache.backdate(key, 121).await;
    }
    let report = engine.run(&sections).await.unwrap();
    assert_eq!(report.updated(), 2);

    let hosts: Vec<_> = service.calls().into_iter().map(|c| c.hostname).collect();
    assert_eq!(
        hosts,
        vec!["a.example.net", "b.example.net", "a.example.net", "b.example.net"]
    );
}
