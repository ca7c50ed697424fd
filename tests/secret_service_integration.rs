//! Secret Service tests against a live D-Bus session.
//!
//! Run with `cargo test -- --ignored` inside a desktop session.
#![cfg(all(target_os = "linux", feature = "secret-service-backend"))]

use keyring::backend::secret_service::SecretServiceBackend;
use keyring::{Backend, Config, Item};

fn open_collection(service: &str) -> SecretServiceBackend {
    let cfg = Config::new().with_service_name(service);
    SecretServiceBackend::open(&cfg).expect("Secret Service should be reachable")
}

#[test]
#[ignore = "requires a running Secret Service"]
fn test_overwrite_with_new_description_replaces_item() {
    let service = format!("keyring-test-{}", std::process::id());
    let mut ring = open_collection(&service);

    let mut first = Item::new("token", "first");
    first.description = "old".to_string();
    ring.set(&first).unwrap();

    let mut second = Item::new("token", "second");
    second.description = "new".to_string();
    ring.set(&second).unwrap();

    let item = ring.get("token").unwrap();
    assert_eq!(item.data, b"second");
    assert_eq!(item.description, "new");
    assert_eq!(ring.keys().unwrap(), vec!["token".to_string()]);

    ring.remove("token").unwrap();
    assert!(ring.keys().unwrap().is_empty());
}
