//! Assertions over reconciled interface lists

use swport_types::InterfaceRecord;

/// Returns the record named `name`, panicking with the known names if absent.
pub fn record<'a>(records: &'a [InterfaceRecord], name: &str) -> &'a InterfaceRecord {
    records.iter().find(|r| r.name == name).unwrap_or_else(|| {
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        panic!("no record {} in {:?}", name, names)
    })
}

/// Asserts that `records` are in strictly increasing name order.
pub fn assert_sorted(records: &[InterfaceRecord]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].name < pair[1].name,
            "{} sorts after {}",
            pair[0].name,
            pair[1].name
        );
    }
}

/// Asserts the fabric-port shape: not configurable, always admin up,
/// and oper state taken from the fabric status.
pub fn assert_fabric(record: &InterfaceRecord) {
    assert!(record.vc_port, "{} is not a fabric port", record.name);
    assert!(!record.configured, "{} fabric port marked configured", record.name);
    assert!(record.admin_up, "{} fabric port admin down", record.name);
    assert_eq!(
        record.oper_up,
        record.vc_status.as_deref() == Some("Up"),
        "{} oper state disagrees with fabric status",
        record.name
    );
    assert!(record.mode.is_none() && record.bundle.is_none());
}
