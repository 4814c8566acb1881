use crate::serialization::SerializerType;
use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct LeafOptions {
    pub invoke_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub resend_interval: Option<Duration>,
    pub resend_initial_delay: Option<Duration>,
    pub resend_grace: Option<Duration>,
    pub serializer: Option<SerializerType>,
}

#[derive(Debug)]
pub(super) struct LeafOptionsValidated {
    pub invoke_timeout: Duration,
    pub connect_timeout: Duration,
    pub resend_interval: Duration,
    pub resend_initial_delay: Duration,
    pub resend_grace: Duration,
    pub serializer: SerializerType,
}

impl LeafOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.invoke_timeout == Duration::from_millis(0) {
            return Err("Invoke timeout must be greater than zero");
        }
        if self.connect_timeout == Duration::from_millis(0) {
            return Err("Connect timeout must be greater than zero");
        }
        if self.resend_interval == Duration::from_millis(0) {
            return Err("Resend interval must be greater than zero");
        }
        if self.resend_grace >= self.resend_interval {
            return Err("Resend grace window must be less than the resend interval");
        }

        Ok(())
    }
}

impl TryFrom<LeafOptions> for LeafOptionsValidated {
    type Error = &'static str;

    fn try_from(options: LeafOptions) -> Result<Self, Self::Error> {
        let values = LeafOptionsValidated {
            invoke_timeout: options.invoke_timeout.unwrap_or(Duration::from_millis(3000)),
            connect_timeout: options.connect_timeout.unwrap_or(Duration::from_millis(3000)),
            resend_interval: options.resend_interval.unwrap_or(Duration::from_millis(2000)),
            resend_initial_delay: options.resend_initial_delay.unwrap_or(Duration::from_millis(1000)),
            resend_grace: options.resend_grace.unwrap_or(Duration::from_millis(100)),
            serializer: options.serializer.unwrap_or_default(),
        };

        values.validate()?;
        Ok(values)
    }
}
