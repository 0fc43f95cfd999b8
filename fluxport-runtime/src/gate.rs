//! Authorization gate run by the host before a submission.
//!
//! A unit with a non-blank `authorizer` name defers to that named authorizer;
//! every other unit is decided by the default authorizer. A name that cannot
//! be resolved denies.

use std::sync::Arc;

use fluxport_core::{
    AllowAll, Authorizer, AuthorizerLocator, ExportUnit, NamedAuthorizers, OwnerId,
};

pub struct AccessGate {
    default: Arc<dyn Authorizer>,
    locator: Arc<dyn AuthorizerLocator>,
}

impl AccessGate {
    pub fn new(default: Arc<dyn Authorizer>, locator: Arc<dyn AuthorizerLocator>) -> Self {
        Self { default, locator }
    }

    /// Default [`AllowAll`] plus the given named authorizers.
    pub fn with_named(named: NamedAuthorizers) -> Self {
        Self::new(Arc::new(AllowAll), Arc::new(named))
    }

    pub fn check(&self, owner_id: &OwnerId, unit: &ExportUnit) -> bool {
        let Some(name) = unit.custom_authorizer() else {
            return self.default.has_permission(owner_id, &unit.biz_type);
        };
        match self.locator.resolve(name) {
            Ok(authorizer) => authorizer.has_permission(owner_id, &unit.biz_type),
            Err(err) => {
                tracing::warn!(
                    owner = %owner_id,
                    biz_type = %unit.biz_type,
                    authorizer = name,
                    "denying export: {err}"
                );
                false
            }
        }
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::with_named(NamedAuthorizers::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxport_core::{AllowList, BizType, ParamShape};
    use rstest::rstest;

    struct DenyAll;

    impl Authorizer for DenyAll {
        fn has_permission(&self, _: &OwnerId, _: &BizType) -> bool {
            false
        }
    }

    fn gate() -> AccessGate {
        AccessGate::new(
            Arc::new(DenyAll),
            Arc::new(NamedAuthorizers::new().with("managers", AllowList::new(["boss"]))),
        )
    }

    fn unit(authorizer: Option<&str>) -> ExportUnit {
        let unit = ExportUnit::new("ORDER_EXPORT", "orders", "query", ParamShape::from("json"));
        match authorizer {
            Some(name) => unit.with_authorizer(name),
            None => unit,
        }
    }

    #[rstest]
    #[case::default_decides(None, "boss", false)]
    #[case::blank_name_uses_default(Some("  "), "boss", false)]
    #[case::named_allows(Some("managers"), "boss", true)]
    #[case::named_denies(Some("managers"), "intern", false)]
    #[case::unresolvable_fails_closed(Some("ghosts"), "boss", false)]
    fn gate_decisions(#[case] authorizer: Option<&str>, #[case] owner: &str, #[case] allowed: bool) {
        assert_eq!(gate().check(&OwnerId::from(owner), &unit(authorizer)), allowed);
    }

    #[test]
    fn default_gate_allows_plain_units() {
        assert!(AccessGate::default().check(&OwnerId::from("anyone"), &unit(None)));
    }
}
