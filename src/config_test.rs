use anyhow::Result;

use crate::config::Config;

#[test]
fn config_deserializes_from_full_env() -> Result<()> {
    let config: Config = envy::from_iter(vec![
        ("RUST_LOG".into(), "error".into()),
        ("KAFKA_BROKER".into(), "broker.test:9095".into()),
        ("GROUP_ID".into(), "shared-group".into()),
        ("TOPICS".into(), "payments, sales".into()),
        ("MONGODB_URI".into(), "mongodb://localhost:27017".into()),
        ("MONGO_DB_NAME".into(), "testdb".into()),
        ("DEPENDENCY_WAIT_SECONDS".into(), "1".into()),
        ("BROKER_WAIT_SECONDS".into(), "2".into()),
    ])?;
    let config = config.finalize("ci".into());

    assert!(config.rust_log == "error", "unexpected value parsed for RUST_LOG, got {}, expected {}", config.rust_log, "error");
    assert!(
        config.kafka_broker == "broker.test:9095",
        "unexpected value parsed for KAFKA_BROKER, got {}, expected {}",
        config.kafka_broker,
        "broker.test:9095"
    );
    assert!(
        config.group_id == "shared-group",
        "unexpected value parsed for GROUP_ID, got {}, expected {}",
        config.group_id,
        "shared-group"
    );
    assert!(
        config.topics == vec!["payments".to_string(), "sales".to_string()],
        "unexpected value parsed for TOPICS, got {:?}, expected {:?}",
        config.topics,
        vec!["payments", "sales"]
    );
    assert!(
        config.mongodb_uri == "mongodb://localhost:27017",
        "unexpected value parsed for MONGODB_URI, got {}, expected {}",
        config.mongodb_uri,
        "mongodb://localhost:27017"
    );
    assert!(
        config.mongo_db_name == "testdb",
        "unexpected value parsed for MONGO_DB_NAME, got {}, expected {}",
        config.mongo_db_name,
        "testdb"
    );
    assert!(
        config.dependency_wait_seconds == 1,
        "unexpected value parsed for DEPENDENCY_WAIT_SECONDS, got {}, expected {}",
        config.dependency_wait_seconds,
        1
    );
    assert!(
        config.broker_wait_seconds == 2,
        "unexpected value parsed for BROKER_WAIT_SECONDS, got {}, expected {}",
        config.broker_wait_seconds,
        2
    );

    Ok(())
}

#[test]
fn config_deserializes_from_sparse_env() -> Result<()> {
    let config: Config = envy::from_iter(vec![("MONGODB_URI".into(), "mongodb://localhost:27017".into())])?;
    let config = config.finalize("alice".into());

    assert!(config.rust_log == "info", "unexpected default for RUST_LOG, got {}, expected {}", config.rust_log, "info");
    assert!(
        config.kafka_broker == "localhost:29092",
        "unexpected default for KAFKA_BROKER, got {}, expected {}",
        config.kafka_broker,
        "localhost:29092"
    );
    assert!(
        config.group_id == "app-consumer-group-alice",
        "unexpected derived GROUP_ID, got {}, expected {}",
        config.group_id,
        "app-consumer-group-alice"
    );
    assert!(config.topics.len() == 9, "unexpected default topic set size, got {}, expected {}", config.topics.len(), 9);
    assert!(
        config.topics.first().map(String::as_str) == Some("age_analysis"),
        "unexpected first default topic, got {:?}, expected {:?}",
        config.topics.first(),
        Some("age_analysis")
    );
    assert!(
        config.mongo_db_name == "kafka_db",
        "unexpected default for MONGO_DB_NAME, got {}, expected {}",
        config.mongo_db_name,
        "kafka_db"
    );
    assert!(
        config.dependency_wait_seconds == 10,
        "unexpected default for DEPENDENCY_WAIT_SECONDS, got {}, expected {}",
        config.dependency_wait_seconds,
        10
    );
    assert!(
        config.broker_wait_seconds == 20,
        "unexpected default for BROKER_WAIT_SECONDS, got {}, expected {}",
        config.broker_wait_seconds,
        20
    );

    Ok(())
}

#[test]
fn config_requires_mongodb_uri() {
    let res = envy::from_iter::<_, Config>(Vec::<(String, String)>::new());
    assert!(res.is_err(), "expected config parse without MONGODB_URI to fail, got {:?}", res.ok());
}
