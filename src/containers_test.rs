use crate::containers::{matches_name, ContainerSpec};

const SPEC: ContainerSpec = ContainerSpec {
    name: "kafka",
    image: "confluentinc/cp-kafka:7.4.1",
    ports: &[(9092, 9092), (29092, 29092)],
    env: &["KAFKA_BROKER_ID=1"],
};

#[test]
fn port_bindings_maps_container_ports_to_host_ports() {
    let bindings = SPEC.port_bindings();

    assert!(bindings.len() == 2, "expected 2 port bindings, got {}", bindings.len());
    let host_binding = bindings
        .get("29092/tcp")
        .and_then(|val| val.as_ref())
        .and_then(|val| val.first())
        .and_then(|val| val.host_port.as_deref());
    assert!(host_binding == Some("29092"), "unexpected host binding for 29092/tcp, got {:?}", host_binding);
    assert!(bindings.contains_key("9092/tcp"), "expected binding key 9092/tcp, got {:?}", bindings.keys());
}

#[test]
fn matches_name_strips_leading_slash() {
    let names = vec!["/kafka".to_string()];
    assert!(matches_name(Some(names.as_slice()), "kafka"), "expected /kafka to match name kafka");
}

#[test]
fn matches_name_rejects_other_containers() {
    let names = vec!["/kafka-ui".to_string()];
    assert!(!matches_name(Some(names.as_slice()), "kafka"), "expected /kafka-ui to not match name kafka");
    assert!(!matches_name(None, "kafka"), "expected unnamed container to not match");
}
