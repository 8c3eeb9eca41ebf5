//! Pushes locally built packages to every autopush mirror

use super::{HookError, InstallHook, InstallRecord, Provenance};
use crate::mirror::{BuildCache, MirrorCollection, MirrorFilter, PushOptions};
use crate::pipeline::InstallSession;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AutopushHook {
    mirrors: Arc<dyn MirrorCollection>,
    cache: Arc<dyn BuildCache>,
}

impl AutopushHook {
    pub fn new(mirrors: Arc<dyn MirrorCollection>, cache: Arc<dyn BuildCache>) -> Self {
        Self { mirrors, cache }
    }
}

impl InstallHook for AutopushHook {
    fn name(&self) -> &'static str {
        "autopush"
    }

    /// Pushes to each binary autopush mirror in turn. The first failed push
    /// aborts the remaining mirrors.
    fn post_install(
        &self,
        record: &InstallRecord<'_>,
        session: &mut InstallSession,
    ) -> Result<(), HookError> {
        if record.provenance == Provenance::BinaryCache {
            debug!(package = %record.spec.name, "installed from binary cache, not pushing");
            return Ok(());
        }

        let mirrors = self
            .mirrors
            .mirrors(MirrorFilter::autopush_binaries())
            .map_err(HookError::Mirrors)?;

        for mirror in mirrors {
            let options = PushOptions {
                force: true,
                regenerate_index: false,
                unsigned: !mirror.signed,
            };
            info!(
                package = %record.spec.name,
                mirror = %mirror.name,
                url = %mirror.push_url(),
                "pushing to mirror"
            );
            self.cache
                .push_or_raise(record.spec, record.prefix, mirror.push_url(), &options)
                .map_err(|source| HookError::Push {
                    mirror: mirror.name.clone(),
                    package: record.spec.identity(),
                    source,
                })?;
            session.record_mirror(&mirror.name);
        }
        Ok(())
    }

    fn on_install_done(&self, session: &InstallSession, update_index: bool) -> Result<(), HookError> {
        if session.updated_mirrors().is_empty() || !update_index {
            return Ok(());
        }

        let eligible = MirrorFilter::autopush_binaries();
        for name in session.updated_mirrors() {
            match self.mirrors.lookup(name).map_err(HookError::Mirrors)? {
                Some(mirror) if eligible.matches(&mirror) => {
                    info!(mirror = %name, "updating mirror index");
                    self.cache
                        .update_index(&mirror)
                        .map_err(|source| HookError::Index {
                            mirror: name.clone(),
                            source,
                        })?;
                }
                Some(_) => {
                    debug!(mirror = %name, "no longer a binary autopush mirror, skipping index update");
                }
                None => {
                    warn!(mirror = %name, "mirror no longer configured, skipping index update");
                }
            }
        }
        Ok(())
    }
}
