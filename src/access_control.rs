//! Access control: fifteen yes/no decision points gating method and event
//! traffic at both the proxy and skeleton sides. The default
//! implementation grants everything; an embedder overrides only the hooks
//! it cares about. A denial suppresses the message and logs it — denying
//! incoming traffic never surfaces an error to the application.
//!
//! The fifteen hooks are declared with a small macro (using `paste`)
//! instead of fifteen hand-written near-identical methods, the same way
//! this crate leans on macro crates elsewhere (e.g. `enumflags2` below) to
//! avoid that kind of boilerplate.

use enumflags2::{bitflags, BitFlags};
use paste::paste;

use crate::id::{ClientId, ProvidedServiceInstanceId};

macro_rules! access_hooks {
    ($($hook:ident),+ $(,)?) => {
        paste! {
            /// One yes/no check per traffic point. `id` is the method or
            /// event id the check concerns, carried as a raw `u16` since
            /// the checks span both `MethodId` and `EventId` spaces
            /// uniformly.
            pub trait AccessControl: Send + Sync {
                $(
                    fn [<allow_ $hook>](&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
                        true
                    }
                )+
            }

            /// Records, per hook, how many times it was consulted and how
            /// many times it denied — used by tests exercising a
            /// non-default policy without a real access-control backend.
            #[derive(Default)]
            pub struct CountingAccessControl {
                $(
                    pub [<$hook _checks>]: std::sync::atomic::AtomicU32,
                )+
            }

            impl CountingAccessControl {
                pub fn new() -> Self {
                    Self::default()
                }
            }

            impl AccessControl for CountingAccessControl {
                $(
                    fn [<allow_ $hook>](&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
                        self.[<$hook _checks>].fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        true
                    }
                )+
            }
        }
    };
}

access_hooks!(
    request_tx,
    request_rx,
    response_tx,
    response_rx,
    error_response_tx,
    error_response_rx,
    application_error_response_tx,
    application_error_response_rx,
    fire_and_forget_tx,
    fire_and_forget_rx,
    event_subscribe,
    event_unsubscribe,
    subscribe_ack,
    subscribe_nack,
    event_notification,
);

/// The default policy: grants every hook. Equivalent to the trait's
/// default methods, spelled out as a concrete type so call sites that want
/// "no access control configured" don't need a blanket impl.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAccessControl;

impl AccessControl for AllowAllAccessControl {}

/// One of the fifteen gated traffic kinds, as a bitflag rather than a
/// `&str`/enum discriminant — so a static policy can be configured as a
/// single `BitFlags<Permission>` value instead of fifteen booleans.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Permission {
    RequestTx = 1 << 0,
    RequestRx = 1 << 1,
    ResponseTx = 1 << 2,
    ResponseRx = 1 << 3,
    ErrorResponseTx = 1 << 4,
    ErrorResponseRx = 1 << 5,
    ApplicationErrorResponseTx = 1 << 6,
    ApplicationErrorResponseRx = 1 << 7,
    FireAndForgetTx = 1 << 8,
    FireAndForgetRx = 1 << 9,
    EventSubscribe = 1 << 10,
    EventUnsubscribe = 1 << 11,
    SubscribeAck = 1 << 12,
    SubscribeNack = 1 << 13,
    EventNotification = 1 << 14,
}

/// A fixed, non-content-dependent policy: each of the fifteen hooks is
/// granted iff its [`Permission`] bit is set, regardless of service,
/// method/event id, or client. Useful for configuration-driven deployments
/// that know their access policy up front and don't need a per-call
/// decision (e.g. a lookup against a certificate-derived role), unlike
/// [`AllowAllAccessControl`] (always grants) or a caller's own
/// [`AccessControl`] implementation (fully dynamic).
#[derive(Debug, Clone, Copy)]
pub struct StaticAccessControl(BitFlags<Permission>);

impl StaticAccessControl {
    pub fn new(allowed: impl Into<BitFlags<Permission>>) -> Self {
        Self(allowed.into())
    }

    pub fn all() -> Self {
        Self(BitFlags::all())
    }

    pub fn none() -> Self {
        Self(BitFlags::empty())
    }
}

impl AccessControl for StaticAccessControl {
    fn allow_request_tx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::RequestTx)
    }
    fn allow_request_rx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::RequestRx)
    }
    fn allow_response_tx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ResponseTx)
    }
    fn allow_response_rx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ResponseRx)
    }
    fn allow_error_response_tx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ErrorResponseTx)
    }
    fn allow_error_response_rx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ErrorResponseRx)
    }
    fn allow_application_error_response_tx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ApplicationErrorResponseTx)
    }
    fn allow_application_error_response_rx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::ApplicationErrorResponseRx)
    }
    fn allow_fire_and_forget_tx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::FireAndForgetTx)
    }
    fn allow_fire_and_forget_rx(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::FireAndForgetRx)
    }
    fn allow_event_subscribe(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::EventSubscribe)
    }
    fn allow_event_unsubscribe(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::EventUnsubscribe)
    }
    fn allow_subscribe_ack(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::SubscribeAck)
    }
    fn allow_subscribe_nack(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::SubscribeNack)
    }
    fn allow_event_notification(&self, _service: ProvidedServiceInstanceId, _id: u16, _client: ClientId) -> bool {
        self.0.contains(Permission::EventNotification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn service() -> ProvidedServiceInstanceId {
        ProvidedServiceInstanceId::new(1, 1, 1, 0).unwrap()
    }

    #[test]
    fn allow_all_grants_every_hook() {
        let access = AllowAllAccessControl;
        assert!(access.allow_request_tx(service(), 1, ClientId(1)));
        assert!(access.allow_event_notification(service(), 2, ClientId(1)));
        assert!(access.allow_subscribe_nack(service(), 3, ClientId(1)));
    }

    #[test]
    fn counting_access_control_tallies_independently_per_hook() {
        let access = CountingAccessControl::new();
        access.allow_request_tx(service(), 1, ClientId(1));
        access.allow_request_tx(service(), 1, ClientId(1));
        access.allow_event_notification(service(), 2, ClientId(1));
        assert_eq!(access.request_tx_checks.load(Ordering::SeqCst), 2);
        assert_eq!(access.event_notification_checks.load(Ordering::SeqCst), 1);
        assert_eq!(access.response_tx_checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn static_access_control_grants_only_configured_permissions() {
        let access = StaticAccessControl::new(Permission::RequestTx | Permission::ResponseRx);
        assert!(access.allow_request_tx(service(), 1, ClientId(1)));
        assert!(access.allow_response_rx(service(), 1, ClientId(1)));
        assert!(!access.allow_request_rx(service(), 1, ClientId(1)));
        assert!(!access.allow_event_notification(service(), 1, ClientId(1)));
    }

    #[test]
    fn static_access_control_all_and_none() {
        let all = StaticAccessControl::all();
        assert!(all.allow_fire_and_forget_tx(service(), 1, ClientId(1)));
        let none = StaticAccessControl::none();
        assert!(!none.allow_fire_and_forget_tx(service(), 1, ClientId(1)));
    }
}
