//! Parsing of device placement strings.
//!
//! Accepts the fully qualified form `/job:w/replica:0/task:0/device:GPU:0`,
//! the short form `/device:CPU:0`, and the legacy form `CPU:0`. Only the
//! device type matters to the offload policy.

/// The interesting parts of a placement string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceName<'a> {
    /// Device type (`CPU`, `GPU`, ...), if the string names one.
    pub device_type: Option<&'a str>,
    /// Device ordinal, if given.
    pub id: Option<u32>,
}

impl<'a> DeviceName<'a> {
    pub fn parse(spec: &'a str) -> Self {
        let mut name = DeviceName {
            device_type: None,
            id: None,
        };
        for component in spec.split('/').filter(|c| !c.is_empty()) {
            let mut parts = component.split(':');
            let head = parts.next().unwrap_or_default();
            let (ty, id) = match head {
                "job" | "replica" | "task" => continue,
                "device" => (parts.next(), parts.next()),
                _ => (Some(head), parts.next()),
            };
            if let Some(ty) = ty.filter(|t| !t.is_empty() && *t != "*") {
                name.device_type = Some(ty);
            }
            name.id = id.and_then(|i| i.parse().ok());
        }
        name
    }

    /// Returns `true` if the device type is CPU.
    pub fn is_cpu(&self) -> bool {
        self.device_type
            .is_some_and(|t| t.eq_ignore_ascii_case("cpu"))
    }
}

/// Returns `true` if `spec` explicitly places work on a CPU device.
pub fn names_cpu(spec: &str) -> bool {
    DeviceName::parse(spec).is_cpu()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_qualified() {
        let d = DeviceName::parse("/job:localhost/replica:0/task:0/device:GPU:1");
        assert_eq!(d.device_type, Some("GPU"));
        assert_eq!(d.id, Some(1));
        assert!(!d.is_cpu());
    }

    #[test]
    fn short_and_legacy_forms() {
        assert!(names_cpu("/device:CPU:0"));
        assert!(names_cpu("cpu:0"));
        assert!(names_cpu("/cpu:0"));
        assert!(!names_cpu("/device:GPU:0"));
    }

    #[test]
    fn unspecified_is_not_cpu() {
        assert!(!names_cpu(""));
        assert!(!names_cpu("/job:worker/task:3"));
        assert_eq!(DeviceName::parse("").device_type, None);
    }
}
