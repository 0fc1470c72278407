/// Derives the NATS subject and queue names used by a secrets backend.
///
/// All derivations are pure string assembly over the `(prefix, version,
/// service_name)` triple, so two mappers built from the same triple always
/// agree on every name.
#[derive(Debug, Clone)]
pub struct SubjectMapper {
    pub prefix: String,
    pub version: String,
    pub service_name: String,
}

impl SubjectMapper {
    pub fn new(prefix: &str, version: &str, service_name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            version: version.to_string(),
            service_name: service_name.to_string(),
        }
    }

    /// Name of the queue group this backend joins, shared by every replica
    /// of the same service.
    pub fn queue_group_name(&self) -> String {
        format!("{}.{}", self.prefix, self.service_name)
    }

    /// Base subject all operations of this service hang off of.
    pub fn secrets_subject(&self) -> String {
        format!("{}.{}.{}", self.prefix, self.version, self.service_name)
    }

    /// Wildcard subject used for the queue subscription.
    pub fn secrets_wildcard_subject(&self) -> String {
        format!("{}.>", self.secrets_subject())
    }

    /// Returns the operation segment of a full subject, e.g. `get` from
    /// `wasmcloud.secrets.v1alpha1.kube.get`.
    ///
    /// Subjects that don't fall under this mapper's base subject yield an
    /// empty string, which the dispatcher rejects as an invalid request.
    pub fn parse_operation<'s>(&self, subject: &'s str) -> &'s str {
        let prefix = format!("{}.", self.secrets_subject());
        subject.strip_prefix(&prefix).unwrap_or("")
    }
}
