use fail::FailScenario;

/// Fail points configured for the lifetime of a test.
///
/// Holds the global fail scenario lock, so tests using fail points never overlap. Every
/// configured fail point is removed again on drop.
pub struct ConfiguredFailPoints<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl ConfiguredFailPoints<'_> {
    /// Configures each `(name, action)` pair, e.g. `("poll_cycle.after_probe", "return(sink)")`.
    pub fn setup(actions: &[(&str, &str)]) -> Self {
        let scenario = FailScenario::setup();

        let mut names = Vec::with_capacity(actions.len());
        for (name, action) in actions {
            if let Err(err) = fail::cfg(*name, action) {
                panic!("invalid action `{action}` for fail point `{name}`: {err}");
            }
            names.push(name.to_string());
        }

        Self {
            _scenario: scenario,
            names,
        }
    }
}

impl Drop for ConfiguredFailPoints<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
