use super::{GenerationRequest, Generator, Profile};
use crate::error::Result;
use parking_lot::{Mutex, MutexGuard};

/// A model whose active skill profile is mutable state.
pub trait ProfileBackend {
    /// Returns the active profile.
    fn active_profile(&self) -> Profile;

    /// Activates `profile`.
    fn select_profile(&mut self, profile: Profile) -> Result<()>;

    /// Generates with whatever profile is active.
    fn complete(&mut self, request: &GenerationRequest) -> Result<String>;
}

/// Exclusive access to a backend running under one profile.
///
/// Acquiring the lease locks the backend and selects the requested profile;
/// dropping it restores the previous profile and unlocks.
pub struct ProfileLease<'a, B: ProfileBackend> {
    backend: MutexGuard<'a, B>,
    previous: Profile,
}

impl<'a, B: ProfileBackend> ProfileLease<'a, B> {
    /// Locks `backend` and selects `profile`.
    pub fn acquire(backend: &'a Mutex<B>, profile: Profile) -> Result<Self> {
        let mut backend = backend.lock();
        let previous = backend.active_profile();
        if previous != profile {
            tracing::debug!(%previous, %profile, "switching generator profile");
            backend.select_profile(profile)?;
        }
        Ok(Self { backend, previous })
    }

    /// Generates under the leased profile.
    #[inline]
    pub fn complete(&mut self, request: &GenerationRequest) -> Result<String> {
        self.backend.complete(request)
    }
}

impl<B: ProfileBackend> Drop for ProfileLease<'_, B> {
    fn drop(&mut self) {
        let previous = self.previous;
        if self.backend.active_profile() != previous {
            if let Err(err) = self.backend.select_profile(previous) {
                tracing::error!(%previous, "fail to restore the generator profile: {err}");
            }
        }
    }
}

/// A [`Generator`] serializing profile switches on a shared backend.
#[derive(Debug, Default)]
pub struct ExclusiveGenerator<B> {
    backend: Mutex<B>,
}

impl<B: ProfileBackend> ExclusiveGenerator<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Acquires a lease on the backend for `profile`.
    #[inline]
    pub fn lease(&self, profile: Profile) -> Result<ProfileLease<'_, B>> {
        ProfileLease::acquire(&self.backend, profile)
    }

    /// Returns the wrapped backend.
    pub fn into_inner(self) -> B {
        self.backend.into_inner()
    }
}

impl<B: ProfileBackend> Generator for ExclusiveGenerator<B> {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut lease = self.lease(request.profile)?;
        lease.complete(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generator::SamplingConfig;

    #[derive(Debug)]
    struct AdapterModel {
        active: Profile,
        seen: Vec<Profile>,
        fail_on: Option<Profile>,
    }

    impl ProfileBackend for AdapterModel {
        fn active_profile(&self) -> Profile {
            self.active
        }

        fn select_profile(&mut self, profile: Profile) -> Result<()> {
            if self.fail_on == Some(profile) {
                return Err(Error::Generation(format!("no adapter for {profile}")));
            }
            self.active = profile;
            Ok(())
        }

        fn complete(&mut self, _request: &GenerationRequest) -> Result<String> {
            self.seen.push(self.active);
            Ok(format!("generated with {}", self.active))
        }
    }

    fn model() -> AdapterModel {
        AdapterModel {
            active: Profile::ToolInvocation,
            seen: Vec::new(),
            fail_on: None,
        }
    }

    #[test]
    fn selects_and_restores_profile() {
        let generator = ExclusiveGenerator::new(model());
        let request = GenerationRequest::new(Profile::Disabled, Vec::new(), SamplingConfig::default());
        assert_eq!(generator.generate(&request).unwrap(), "generated with disabled");
        let request = GenerationRequest { profile: Profile::PersonaReply, ..request };
        generator.generate(&request).unwrap();

        let model = generator.into_inner();
        assert_eq!(model.seen, [Profile::Disabled, Profile::PersonaReply]);
        assert_eq!(model.active, Profile::ToolInvocation);
    }

    #[test]
    fn failed_selection_releases_the_lock() {
        let generator = ExclusiveGenerator::new(AdapterModel {
            fail_on: Some(Profile::PersonaReply),
            ..model()
        });
        let request =
            GenerationRequest::new(Profile::PersonaReply, Vec::new(), SamplingConfig::default());
        assert!(generator.generate(&request).is_err());
        let request = GenerationRequest { profile: Profile::ToolInvocation, ..request };
        assert!(generator.generate(&request).is_ok());
    }
}
