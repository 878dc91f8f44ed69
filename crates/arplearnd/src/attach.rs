//! Ingress classifier attachment
//!
//! For every monitored interface a clsact queueing discipline is ensured and
//! the ARP classifier is installed on the ingress hook as a direct-action
//! filter. Re-running the attachment replaces the filter instead of stacking
//! a second copy.

use crate::error::{ArpLearnError, Result};
use std::fmt;
use std::io;
use tracing::{info, instrument};

/// Filter priority used on the ingress hook
pub const FILTER_PRIORITY: u16 = 1;

/// Filter handle used on the ingress hook
pub const FILTER_HANDLE: u32 = 1;

/// Interface name resolved to its OS index at attach time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredInterface {
    pub name: String,
    pub index: u32,
}

impl MonitoredInterface {
    /// Resolve `name` to a live interface
    pub fn resolve(name: &str) -> Result<Self> {
        let index = nix::net::if_::if_nametoindex(name).map_err(|errno| {
            ArpLearnError::InterfaceNotFound {
                name: name.to_string(),
                source: io::Error::from(errno),
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            index,
        })
    }
}

impl fmt::Display for MonitoredInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.index)
    }
}

/// Installs the classifier on one interface
pub trait FilterAttacher {
    fn attach(&mut self, interface: &MonitoredInterface) -> Result<()>;
}

/// Resolve and attach every interface in order. The first failure aborts
/// the whole set.
#[instrument(skip(attacher))]
pub fn attach_all<A: FilterAttacher>(
    attacher: &mut A,
    names: &[String],
) -> Result<Vec<MonitoredInterface>> {
    if names.is_empty() {
        return Err(ArpLearnError::Config(
            "no interfaces to attach to".to_string(),
        ));
    }

    let mut attached = Vec::with_capacity(names.len());
    for name in names {
        let interface = MonitoredInterface::resolve(name)?;
        attacher.attach(&interface)?;
        info!(interface = %interface, "Attached ARP classifier");
        attached.push(interface);
    }
    Ok(attached)
}

/// clsact creation fails with EEXIST when the qdisc is already there
pub fn qdisc_already_present(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::AlreadyExists || err.raw_os_error() == Some(libc::EEXIST)
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{
        FILTER_HANDLE, FILTER_PRIORITY, FilterAttacher, MonitoredInterface, qdisc_already_present,
    };
    use crate::error::{ArpLearnError, Result};
    use aya::programs::SchedClassifier;
    use aya::programs::tc::{self, NlOptions, SchedClassifierLinkId, TcAttachOptions, TcAttachType};
    use std::collections::HashMap;
    use tracing::debug;

    /// Attaches a loaded `SchedClassifier` through netlink tc
    pub struct ClassifierAttacher<'a> {
        program: &'a mut SchedClassifier,
        program_name: String,
        links: HashMap<u32, SchedClassifierLinkId>,
    }

    impl<'a> ClassifierAttacher<'a> {
        pub fn new(program: &'a mut SchedClassifier, program_name: impl Into<String>) -> Self {
            Self {
                program,
                program_name: program_name.into(),
                links: HashMap::new(),
            }
        }

        fn ensure_clsact(interface: &MonitoredInterface) -> Result<()> {
            match tc::qdisc_add_clsact(&interface.name) {
                Ok(()) => {
                    debug!(interface = %interface.name, "Added clsact qdisc");
                    Ok(())
                }
                Err(e) if qdisc_already_present(&e) => {
                    debug!(interface = %interface.name, "clsact qdisc already present");
                    Ok(())
                }
                Err(e) => Err(ArpLearnError::Attach {
                    interface: interface.name.clone(),
                    reason: format!("failed to add clsact qdisc: {}", e),
                }),
            }
        }

        /// Remove the filter this attacher or an earlier run left behind;
        /// nothing to remove is fine
        fn remove_previous_filter(&mut self, interface: &MonitoredInterface) {
            if let Some(link) = self.links.remove(&interface.index) {
                match self.program.detach(link) {
                    Ok(()) => return,
                    Err(e) => debug!(
                        interface = %interface.name,
                        error = %e,
                        "Detaching own filter failed, falling back to lookup by name"
                    ),
                }
            }
            if let Err(e) =
                tc::qdisc_detach_program(&interface.name, TcAttachType::Ingress, &self.program_name)
            {
                debug!(
                    interface = %interface.name,
                    program = %self.program_name,
                    error = %e,
                    "No previous ingress filter removed"
                );
            }
        }
    }

    impl FilterAttacher for ClassifierAttacher<'_> {
        fn attach(&mut self, interface: &MonitoredInterface) -> Result<()> {
            Self::ensure_clsact(interface)?;
            self.remove_previous_filter(interface);

            let options = TcAttachOptions::Netlink(NlOptions {
                priority: FILTER_PRIORITY,
                handle: FILTER_HANDLE,
            });
            let link = self
                .program
                .attach_with_options(&interface.name, TcAttachType::Ingress, options)
                .map_err(|e| ArpLearnError::Attach {
                    interface: interface.name.clone(),
                    reason: format!("failed to install ingress filter: {}", e),
                })?;
            self.links.insert(interface.index, link);
            Ok(())
        }
    }

}

#[cfg(target_os = "linux")]
pub use linux::ClassifierAttacher;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Models tc replace semantics: one filter slot per interface
    #[derive(Default)]
    struct FakeTc {
        qdiscs: HashMap<u32, usize>,
        filters: HashMap<u32, &'static str>,
        attach_calls: usize,
        fail_on: Option<String>,
    }

    impl FilterAttacher for FakeTc {
        fn attach(&mut self, interface: &MonitoredInterface) -> Result<()> {
            self.attach_calls += 1;
            if self.fail_on.as_deref() == Some(interface.name.as_str()) {
                return Err(ArpLearnError::Attach {
                    interface: interface.name.clone(),
                    reason: "injected".to_string(),
                });
            }
            *self.qdiscs.entry(interface.index).or_default() = 1;
            self.filters.insert(interface.index, "arpReflect");
            Ok(())
        }
    }

    #[test]
    fn test_empty_interface_list_is_config_error() {
        let mut tc = FakeTc::default();
        assert!(matches!(attach_all(&mut tc, &[]), Err(ArpLearnError::Config(_))));
        assert_eq!(tc.attach_calls, 0);
    }

    #[test]
    fn test_unknown_interface_is_fatal_before_attach() {
        let mut tc = FakeTc::default();
        let err = attach_all(&mut tc, &["arpl-missing0".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            ArpLearnError::InterfaceNotFound { ref name, .. } if name == "arpl-missing0"
        ));
        assert!(err.is_fatal());
        assert_eq!(tc.attach_calls, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_attach_all_twice_resolves_same_interfaces() {
        let mut tc = FakeTc::default();
        let names = vec!["lo".to_string()];

        let first = attach_all(&mut tc, &names).unwrap();
        let qdiscs = tc.qdiscs.clone();
        let filters = tc.filters.clone();
        let second = attach_all(&mut tc, &names).unwrap();

        assert_eq!(first, second);
        assert_eq!(tc.qdiscs, qdiscs);
        assert_eq!(tc.filters, filters);
        assert_eq!(tc.filters.len(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failure_stops_remaining_interfaces() {
        let mut tc = FakeTc {
            fail_on: Some("lo".to_string()),
            ..Default::default()
        };
        let names = vec!["lo".to_string(), "lo".to_string()];
        let err = attach_all(&mut tc, &names).unwrap_err();
        assert!(matches!(err, ArpLearnError::Attach { .. }));
        assert_eq!(tc.attach_calls, 1);
    }

    #[test]
    fn test_qdisc_already_present() {
        assert!(qdisc_already_present(&io::Error::from_raw_os_error(libc::EEXIST)));
        assert!(qdisc_already_present(&io::Error::from(io::ErrorKind::AlreadyExists)));
        assert!(!qdisc_already_present(&io::Error::from_raw_os_error(libc::EPERM)));
    }
}
