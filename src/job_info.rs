//! The immutable job descriptor and its transportable payload form.

use derive_builder::Builder;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value as JsonValue};

use std::{borrow::Cow, time::Duration};

use crate::error::JobInfoError;

#[derive(Clone, Eq, Hash, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier used to supersede pending alarms of the same logical job.
///
/// # Examples
///
/// ```rust
/// use alarm_job::JobTag;
///
/// const REFRESH: JobTag = JobTag::new("refresh-channel");
/// assert_eq!(REFRESH.as_str(), "refresh-channel");
/// ```
pub struct JobTag(Cow<'static, str>);

impl JobTag {
    pub const fn new(tag: &'static str) -> Self {
        JobTag(Cow::Borrowed(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for JobTag {
    fn from(tag: &str) -> Self {
        JobTag(Cow::Owned(tag.to_owned()))
    }
}

impl From<String> for JobTag {
    fn from(tag: String) -> Self {
        JobTag(Cow::Owned(tag))
    }
}

impl std::fmt::Display for JobTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[serde_with::serde_as]
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate", error = "JobInfoError"))]
/// Descriptor of a unit of deferred work.
///
/// Build with [`JobInfo::builder`]; the value is immutable afterwards.
///
/// ```rust
/// use alarm_job::JobInfo;
/// use std::time::Duration;
///
/// let job = JobInfo::builder()
///     .tag("sync")
///     .initial_delay(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(job.tag().map(|t| t.as_str()), Some("sync"));
/// ```
pub struct JobInfo {
    #[builder(setter(into, strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<JobTag>,
    #[builder(setter(custom), default)]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default)]
    initial_delay: Duration,
    #[builder(setter(custom), default)]
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    extras: JsonValue,
}

impl JobInfo {
    pub fn builder() -> JobInfoBuilder {
        JobInfoBuilder::default()
    }

    pub fn tag(&self) -> Option<&JobTag> {
        self.tag.as_ref()
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Decode the extras payload into a typed struct.
    pub fn extras<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.extras.clone())
    }

    /// Encode into the form carried by an alarm request.
    pub fn to_bundle(&self) -> Result<JobBundle, JobInfoError> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(JobBundle(map)),
            other => Err(JobInfoError::MalformedBundle(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Decode a bundle produced by [`JobInfo::to_bundle`], re-validating it.
    pub fn from_bundle(bundle: &JobBundle) -> Result<Self, JobInfoError> {
        let job: JobInfo = serde_json::from_value(JsonValue::Object(bundle.0.clone()))?;
        if job.tag.as_ref().is_some_and(JobTag::is_empty) {
            return Err(JobInfoError::EmptyTag);
        }
        Ok(job)
    }
}

impl JobInfoBuilder {
    /// Delay before the first eligible execution, kept at millisecond precision.
    pub fn initial_delay(&mut self, delay: Duration) -> &mut Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.initial_delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn extras<E: Serialize>(&mut self, extras: E) -> Result<&mut Self, JobInfoError> {
        self.extras = Some(serde_json::to_value(extras)?);
        Ok(self)
    }

    fn validate(&self) -> Result<(), JobInfoError> {
        if let Some(Some(tag)) = &self.tag
            && tag.is_empty()
        {
            return Err(JobInfoError::EmptyTag);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
/// Serialized [`JobInfo`] as a JSON object.
pub struct JobBundle(Map<String, JsonValue>);

impl JobBundle {
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, JobInfoError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, JobInfoError> {
        Ok(Self(serde_json::from_slice(bytes)?))
    }
}
