use chrono::{DateTime, Utc};

/// Represents an entity responsible for providing dates across application. Collection timestamps
/// and `last_updated` marks both come from here, so tests can pin them.
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single moment.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn time(&self) -> DateTime<Utc> {
        self.0
    }
}
