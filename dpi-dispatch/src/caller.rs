//! Caller-site capture for diagnostics
//!
//! The site attached to a diagnostic is taken from, in order:
//! 1. a site the host set for the current thread with [`with_caller_site`],
//! 2. the environment's `CallerLocator` (e.g. the simulator's own caller info),
//! 3. the Rust call site of the stub, captured with `#[track_caller]`.
//!
//! Caller sites are metadata only and never influence dispatch.

use crate::types::CallerSite;
use std::cell::RefCell;
use std::panic::Location;

thread_local! {
    static HOST_SITE: RefCell<Option<CallerSite>> = const { RefCell::new(None) };
}

/// Source of caller sites supplied by the host
pub trait CallerLocator: Send + Sync {
    /// Current caller of the import being dispatched, if known
    fn locate(&self) -> Option<CallerSite>;
}

impl<F> CallerLocator for F
where
    F: Fn() -> Option<CallerSite> + Send + Sync,
{
    fn locate(&self) -> Option<CallerSite> {
        self()
    }
}

/// Run `f` with `site` reported as the caller of any import dispatched on
/// this thread. Scopes nest; the previous site is restored afterwards.
pub fn with_caller_site<R>(site: CallerSite, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<CallerSite>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            HOST_SITE.with(|slot| *slot.borrow_mut() = previous);
        }
    }

    let previous = HOST_SITE.with(|slot| slot.borrow_mut().replace(site));
    let _restore = Restore(previous);
    f()
}

/// Site set by the innermost enclosing [`with_caller_site`] on this thread
pub fn scoped_site() -> Option<CallerSite> {
    HOST_SITE.with(|slot| slot.borrow().clone())
}

/// Pick the caller site for a diagnostic
pub(crate) fn locate(
    locator: Option<&dyn CallerLocator>,
    fallback: &'static Location<'static>,
) -> CallerSite {
    scoped_site()
        .or_else(|| locator.and_then(|l| l.locate()))
        .unwrap_or_else(|| CallerSite::from(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_nests_and_restores() {
        assert_eq!(scoped_site(), None);

        with_caller_site(CallerSite::new("tb.sv", 10), || {
            assert_eq!(scoped_site(), Some(CallerSite::new("tb.sv", 10)));

            with_caller_site(CallerSite::new("pipeline.sv", 42), || {
                assert_eq!(scoped_site(), Some(CallerSite::new("pipeline.sv", 42)));
            });

            assert_eq!(scoped_site(), Some(CallerSite::new("tb.sv", 10)));
        });

        assert_eq!(scoped_site(), None);
    }

    #[test]
    fn test_scope_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            with_caller_site(CallerSite::new("tb.sv", 1), || panic!("boom"));
        });
        assert!(result.is_err());
        assert_eq!(scoped_site(), None);
    }

    #[test]
    fn test_locate_precedence() {
        let fallback = Location::caller();
        let locator = || Some(CallerSite::new("host.sv", 7));

        assert_eq!(locate(None, fallback), CallerSite::from(fallback));
        assert_eq!(locate(Some(&locator), fallback), CallerSite::new("host.sv", 7));

        with_caller_site(CallerSite::new("scoped.sv", 3), || {
            assert_eq!(locate(Some(&locator), fallback), CallerSite::new("scoped.sv", 3));
        });
    }

    #[test]
    fn test_locator_without_answer_falls_back() {
        let fallback = Location::caller();
        let locator = || -> Option<CallerSite> { None };
        assert_eq!(locate(Some(&locator), fallback), CallerSite::from(fallback));
    }
}
