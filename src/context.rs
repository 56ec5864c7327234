use serde::Serialize;

/// Request-scoped metadata carried by every record of a request.
///
/// Any type exposing these accessors can be used with
/// [`WithLogContext`](crate::WithLogContext). `Clone` must yield an
/// independent value, the middleware clones its template once per request.
pub trait CorrelationContext: Clone + Serialize + Send + Sync + 'static {
    fn correlator(&self) -> &str;
    fn set_correlator(&mut self, corr: String);
    fn transaction_id(&self) -> &str;
    fn set_transaction_id(&mut self, trans: String);
}

/// Log context for a base service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogContext {
    #[serde(rename = "trans", skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,
    #[serde(rename = "corr", skip_serializing_if = "String::is_empty")]
    pub correlator: String,
    #[serde(rename = "op", skip_serializing_if = "String::is_empty")]
    pub operation: String,
    #[serde(rename = "svc", skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(rename = "comp", skip_serializing_if = "String::is_empty")]
    pub component: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub realm: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alarm: String,
}

impl LogContext {
    pub fn new(service: impl Into<String>, component: impl Into<String>) -> Self {
        LogContext {
            service: service.into(),
            component: component.into(),
            ..Default::default()
        }
    }

    pub(crate) fn alarm(alarm: impl Into<String>) -> Self {
        LogContext {
            alarm: alarm.into(),
            ..Default::default()
        }
    }
}

impl CorrelationContext for LogContext {
    fn correlator(&self) -> &str {
        &self.correlator
    }

    fn set_correlator(&mut self, corr: String) {
        self.correlator = corr;
    }

    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    fn set_transaction_id(&mut self, trans: String) {
        self.transaction_id = trans;
    }
}

/// Per-call context describing an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReqLogContext {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(rename = "remoteaddr", skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
}

/// Per-call context describing an outbound response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RespLogContext {
    #[serde(skip_serializing_if = "is_zero_u16")]
    pub status: u16,
    /// Milliseconds.
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub latency: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}
