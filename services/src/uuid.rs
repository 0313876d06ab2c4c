use uuid::Uuid;

/// Deterministic UUIDv5 from an arbitrary string id.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Fresh random id for sessions and other short-lived handles.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}
