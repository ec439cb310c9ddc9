/// Program cache
///
/// Maps a feature hash to a linked, validated program. Compiled stages are
/// cached per (stage, feature hash) on their own, so a stage that compiled
/// fine survives a failed link of its program and is reused on the next try.
///
/// The cache is plain data mutated through `&mut self` and a driver
/// reference; the owner keeps it on the GPU thread.

use rustc_hash::{FxHashMap, FxHashSet};
use crate::error::{Error, Result};
use crate::gpu::{GpuDriver, ProgramHandle, StageHandle};
use crate::shader::FeatureHash;

/// One linked variant and the stages it was linked from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCacheEntry {
    pub vertex: StageHandle,
    pub fragment: StageHandle,
    pub program: ProgramHandle,
}

/// Linked programs and compiled stages of one shader, by feature hash
#[derive(Debug, Default)]
pub struct ProgramCache {
    vertex_stages: FxHashMap<FeatureHash, StageHandle>,
    fragment_stages: FxHashMap<FeatureHash, StageHandle>,
    programs: FxHashMap<FeatureHash, ProgramCacheEntry>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program of `hash`, created on first request
    ///
    /// On a hit no driver call is made. On a miss the providers are invoked
    /// for the stages not cached yet, then the program is linked and
    /// validated. A program that fails validation is deleted; the stages stay
    /// cached.
    ///
    /// # Errors
    ///
    /// - whatever a provider returns (typically `Compilation`)
    /// - `Link` with the driver log when validation fails
    pub fn get_or_create<V, F>(
        &mut self,
        driver: &mut dyn GpuDriver,
        hash: FeatureHash,
        vertex_provider: V,
        fragment_provider: F,
    ) -> Result<ProgramHandle>
    where
        V: FnOnce(&mut dyn GpuDriver) -> Result<StageHandle>,
        F: FnOnce(&mut dyn GpuDriver) -> Result<StageHandle>,
    {
        if let Some(entry) = self.programs.get(&hash) {
            crate::engine_trace!("lumen::ProgramCache", "Cache hit for feature hash {}", hash);
            return Ok(entry.program);
        }

        let vertex = match self.vertex_stages.get(&hash) {
            Some(handle) => *handle,
            None => {
                let handle = vertex_provider(&mut *driver)?;
                self.vertex_stages.insert(hash, handle);
                handle
            }
        };
        let fragment = match self.fragment_stages.get(&hash) {
            Some(handle) => *handle,
            None => {
                let handle = fragment_provider(&mut *driver)?;
                self.fragment_stages.insert(hash, handle);
                handle
            }
        };

        let program = driver.create_program()?;
        driver.attach(program, vertex);
        driver.attach(program, fragment);
        driver.link(program);

        if !driver.validate(program) {
            let log = driver.program_info_log(program);
            driver.delete_program(program);
            return Err(Error::Link { log });
        }

        self.programs.insert(hash, ProgramCacheEntry { vertex, fragment, program });
        crate::engine_debug!("lumen::ProgramCache", "Created program variant for feature hash {}", hash);
        Ok(program)
    }

    pub fn get(&self, hash: FeatureHash) -> Option<&ProgramCacheEntry> {
        self.programs.get(&hash)
    }

    pub fn contains(&self, hash: FeatureHash) -> bool {
        self.programs.contains_key(&hash)
    }

    /// Number of linked programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.vertex_stages.is_empty() && self.fragment_stages.is_empty()
    }

    /// Number of compiled stage objects, linked or not
    pub fn stage_count(&self) -> usize {
        self.vertex_stages.len() + self.fragment_stages.len()
    }

    /// Delete every program, then every stage exactly once, and clear
    ///
    /// Returns the number of objects deleted. A second call deletes nothing.
    pub fn dispose(&mut self, driver: &mut dyn GpuDriver) -> usize {
        let mut deleted = 0;

        for (_, entry) in self.programs.drain() {
            driver.delete_program(entry.program);
            deleted += 1;
        }

        let mut stages = FxHashSet::default();
        for (_, handle) in self.vertex_stages.drain().chain(self.fragment_stages.drain()) {
            if stages.insert(handle) {
                driver.delete_shader(handle);
                deleted += 1;
            }
        }

        deleted
    }
}

#[cfg(test)]
#[path = "program_cache_tests.rs"]
mod tests;
