use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PingEvent {
    pub zen: String,
}
