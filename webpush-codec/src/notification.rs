use std::fmt;

/// Default time a push service keeps an undelivered message, four weeks
pub const DEFAULT_TTL: u32 = 2_419_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message for one subscription. Only the payload is encrypted, the other fields become headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub payload: Option<Vec<u8>>,
    pub ttl: Option<u32>,
    pub topic: Option<String>,
    pub urgency: Option<Urgency>,
}

impl Notification {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::default()
        }
    }

    /// A push without a body. The service worker still receives a `push` event.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_ttl(self, ttl: u32) -> Self {
        Self {
            ttl: Some(ttl),
            ..self
        }
    }

    pub fn with_topic(self, topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..self
        }
    }

    pub fn with_urgency(self, urgency: Urgency) -> Self {
        Self {
            urgency: Some(urgency),
            ..self
        }
    }
}
