//! Unit tests for shader_asset.rs
//!
//! Most tests bind a mock driver to the test thread, so GPU operations run
//! inline. Cross-thread behavior is covered with a dedicated GpuThread.

use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use serial_test::serial;
use crate::config::{ConfigProvider, NoConfig, RenderingConfig};
use crate::engine::Engine;
use crate::error::Error;
use crate::gpu::{GpuContext, GpuThread};
use crate::gpu::mock_gpu_driver::MockGpuDriver;
use crate::log::{Logger, LogEntry, LogSeverity};
use crate::shader::{
    FeatureFlags, LifecyclePhase, ParameterType, ShaderAsset, ShaderAssetDesc,
    ShaderData, ShaderIncludes, ShaderTemplatePair,
};

const VERTEX: &str = "void main(){gl_Position=vec4(0);}";
const FRAGMENT: &str = "void main(){gl_FragColor=vec4(1);}";
const BROKEN_FRAGMENT: &str = "void main(){gl_FragColor=vec4(1);";
const SSAO_FRAGMENT: &str = "\
uniform vec4 tint;
void main() {
#ifdef SSAO
    gl_FragColor = tint * 0.5;
#else
    gl_FragColor = tint;
#endif
}";

fn data(vertex: &str, fragment: &str) -> ShaderData {
    ShaderData::new(ShaderTemplatePair::new(vertex, fragment))
}

fn desc(urn: &str, vertex: &str, fragment: &str) -> ShaderAssetDesc {
    ShaderAssetDesc {
        urn: urn.to_string(),
        data: data(vertex, fragment),
        config: Arc::new(NoConfig),
        includes: Arc::new(ShaderIncludes::default()),
    }
}

struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOAD
// ============================================================================

#[test]
fn test_load_compiles_active_variant() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:default", VERTEX, FRAGMENT), context.handle()).unwrap();

    assert_eq!(asset.phase(), LifecyclePhase::Loaded);
    assert_eq!(asset.cached_variant_count().unwrap(), 1);
    assert!(asset.is_cached(FeatureFlags::empty()).unwrap());
    assert_eq!(mock.live_program_count(), 1);
}

#[test]
fn test_load_with_broken_template_still_loads() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:broken", VERTEX, BROKEN_FRAGMENT), context.handle()).unwrap();

    assert_eq!(asset.cached_variant_count().unwrap(), 0);
    assert!(matches!(
        asset.program(FeatureFlags::empty()),
        Err(Error::Compilation { .. })
    ));
}

#[test]
fn test_load_fails_when_gpu_unreachable() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let handle = context.handle();
    drop(context);

    let result = thread::spawn(move || {
        ShaderAsset::load(desc("test:nogpu", VERTEX, FRAGMENT), handle).map(|_| ())
    }).join().unwrap();
    assert!(matches!(result, Err(Error::ThreadAffinity(_))));
}

// ============================================================================
// VARIANTS
// ============================================================================

#[test]
fn test_program_hit_does_not_recompile() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:hit", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();

    let first = asset.program(FeatureFlags::SSAO).unwrap();
    let compiles = mock.call_count("compile");
    let second = asset.program(FeatureFlags::SSAO).unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.call_count("compile"), compiles);
}

#[test]
fn test_program_ignores_unreferenced_flags() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:mask", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();

    assert_eq!(asset.available_features(), FeatureFlags::SSAO);

    let ssao = asset.program(FeatureFlags::SSAO).unwrap();
    let ssao_bloom = asset.program(FeatureFlags::SSAO | FeatureFlags::BLOOM).unwrap();
    let plain = asset.program(FeatureFlags::BLOOM).unwrap();

    assert_eq!(ssao, ssao_bloom);
    assert_ne!(ssao, plain);
    assert_eq!(asset.cached_variant_count().unwrap(), 2);
}

#[test]
fn test_variant_source_contains_enabled_flag() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:flag", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();

    asset.program(FeatureFlags::SSAO).unwrap();
    let sources = mock.compiled_sources();
    assert!(sources.last().unwrap().contains("#define SSAO\n"));
}

#[test]
fn test_activate_sets_active_variant() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:activate", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();

    let program = asset.activate(FeatureFlags::SSAO).unwrap();
    assert_eq!(asset.active_features(), FeatureFlags::SSAO);
    assert_eq!(asset.program(FeatureFlags::SSAO).unwrap(), program);
}

#[test]
fn test_config_is_polled_at_compile_time() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let config = Arc::new(RwLock::new(RenderingConfig::default()));

    let mut asset_desc = desc("test:config", VERTEX, SSAO_FRAGMENT);
    asset_desc.config = config.clone() as Arc<dyn ConfigProvider>;
    let asset = ShaderAsset::load(asset_desc, context.handle()).unwrap();

    config.write().unwrap().texture_atlas_tile_size = Some(0.125);
    asset.program(FeatureFlags::SSAO).unwrap();

    let sources = mock.compiled_sources();
    assert!(sources.first().unwrap().contains("#define TEXTURE_OFFSET 0.06125\n"));
    assert!(sources.last().unwrap().contains("#define TEXTURE_OFFSET 0.125\n"));
}

#[test]
fn test_config_toggle_selects_variant() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let config = Arc::new(RwLock::new(RenderingConfig { ssao: true, ..RenderingConfig::default() }));

    let mut asset_desc = desc("test:toggle", VERTEX, SSAO_FRAGMENT);
    asset_desc.config = config.clone() as Arc<dyn ConfigProvider>;
    let asset = ShaderAsset::load(asset_desc, context.handle()).unwrap();

    let with_ssao = asset.program(FeatureFlags::empty()).unwrap();
    assert_eq!(asset.program(FeatureFlags::SSAO).unwrap(), with_ssao);
    assert!(mock.compiled_sources().iter().all(|s| s.contains("#define SSAO\n")));

    config.write().unwrap().ssao = false;
    let without_ssao = asset.program(FeatureFlags::empty()).unwrap();
    assert_ne!(without_ssao, with_ssao);
    assert!(!mock.compiled_sources().last().unwrap().contains("#define SSAO\n"));
    assert!(asset.is_cached(FeatureFlags::empty()).unwrap());
    assert_eq!(asset.cached_variant_count().unwrap(), 2);
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[test]
fn test_parameters_and_uniform_location() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:params", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();

    let tint = asset.parameter("tint").unwrap();
    assert_eq!(tint.param_type, ParameterType::Vec4);
    assert_eq!(asset.parameters().len(), 1);
    assert!(asset.parameter("missing").is_none());

    assert_eq!(asset.uniform_location(FeatureFlags::empty(), "tint").unwrap(), Some(0));
    assert_eq!(asset.uniform_location(FeatureFlags::empty(), "missing").unwrap(), None);
}

// ============================================================================
// RELOAD
// ============================================================================

#[test]
#[serial]
fn test_reload_with_broken_template_then_fixed() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CapturingLogger { entries: entries.clone() });

    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:reload", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();
    asset.activate(FeatureFlags::SSAO).unwrap();
    assert!(asset.is_cached(FeatureFlags::SSAO).unwrap());

    // Broken fragment: reload succeeds, variant is gone, failure is logged
    let broken = "uniform vec4 tint;\nvoid main() {\n#ifdef SSAO\n gl_FragColor = tint;\n#endif\n";
    asset.reload(data(VERTEX, broken)).unwrap();
    assert!(!asset.is_cached(FeatureFlags::SSAO).unwrap());
    assert_eq!(asset.cached_variant_count().unwrap(), 0);

    let warned = entries.lock().unwrap().iter().any(|e| {
        e.severity == LogSeverity::Warn && e.message.contains("test:reload") && e.message.contains("syntax error")
    });
    assert!(warned);

    // Fixed fragment repopulates the active variant
    asset.reload(data(VERTEX, SSAO_FRAGMENT)).unwrap();
    assert!(asset.is_cached(FeatureFlags::SSAO).unwrap());
    assert_eq!(asset.phase(), LifecyclePhase::Loaded);

    Engine::reset_logger();
}

#[test]
fn test_reload_releases_previous_variants() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:release", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();
    asset.program(FeatureFlags::SSAO).unwrap();
    assert_eq!(mock.live_program_count(), 2);

    asset.reload(data(VERTEX, FRAGMENT)).unwrap();

    // Only the recompiled active (empty) variant is alive
    assert_eq!(mock.live_program_count(), 1);
    assert_eq!(mock.live_shader_count(), 2);
    assert!(mock.invalid_calls().is_empty());
    assert!(asset.available_features().is_empty());
}

#[test]
fn test_reload_replaces_parameters() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:reparam", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();
    assert!(asset.parameter("tint").is_some());

    asset.reload(data(VERTEX, "uniform float alpha;\nvoid main(){gl_FragColor=vec4(alpha);}")).unwrap();
    assert!(asset.parameter("tint").is_none());
    assert!(asset.parameter("alpha").is_some());
    assert!(asset.templates().unwrap().fragment().contains("alpha"));
}

// ============================================================================
// DISPOSE
// ============================================================================

#[test]
fn test_dispose_is_idempotent() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:dispose", VERTEX, SSAO_FRAGMENT), context.handle()).unwrap();
    asset.program(FeatureFlags::SSAO).unwrap();

    asset.dispose().unwrap();
    assert_eq!(mock.live_program_count(), 0);
    assert_eq!(mock.live_shader_count(), 0);

    let calls = mock.total_calls();
    asset.dispose().unwrap();
    assert_eq!(mock.total_calls(), calls);
    assert!(mock.invalid_calls().is_empty());
}

#[test]
fn test_operations_after_dispose_fail() {
    let context = GpuContext::new(MockGpuDriver::new().boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:gone", VERTEX, FRAGMENT), context.handle()).unwrap();
    asset.dispose().unwrap();

    assert_eq!(asset.phase(), LifecyclePhase::Disposed);
    assert!(matches!(asset.program(FeatureFlags::empty()), Err(Error::UseAfterDispose(ref urn)) if urn == "test:gone"));
    assert!(matches!(asset.reload(data(VERTEX, FRAGMENT)), Err(Error::UseAfterDispose(_))));
    assert!(matches!(asset.activate(FeatureFlags::empty()), Err(Error::UseAfterDispose(_))));
    assert!(matches!(asset.cached_variant_count(), Err(Error::UseAfterDispose(_))));
}

#[test]
fn test_drop_disposes() {
    let mock = MockGpuDriver::new();
    let context = GpuContext::new(mock.boxed()).unwrap();
    let asset = ShaderAsset::load(desc("test:drop", VERTEX, FRAGMENT), context.handle()).unwrap();
    assert_eq!(mock.live_program_count(), 1);

    drop(asset);
    assert_eq!(mock.live_program_count(), 0);
    assert_eq!(mock.live_shader_count(), 0);
}

#[test]
fn test_dispose_with_stopped_gpu_thread_reports_affinity_error() {
    let mock = MockGpuDriver::new();
    let factory_mock = mock.clone();
    let mut gpu = GpuThread::spawn("lumen-asset-stop", move || Ok(factory_mock.boxed())).unwrap();
    let asset = ShaderAsset::load(desc("test:leak", VERTEX, FRAGMENT), gpu.handle()).unwrap();

    gpu.shutdown();

    assert!(matches!(asset.dispose(), Err(Error::ThreadAffinity(_))));
    assert!(asset.is_disposed());
    // Handles leak rather than being touched from the wrong thread
    assert_eq!(mock.live_program_count(), 1);
    assert!(asset.dispose().is_ok());
}

// ============================================================================
// THREAD AFFINITY
// ============================================================================

#[test]
fn test_all_driver_calls_happen_on_gpu_thread() {
    let mock = MockGpuDriver::new();
    let factory_mock = mock.clone();
    let gpu = GpuThread::spawn("lumen-asset-affinity", move || Ok(factory_mock.boxed())).unwrap();
    let gpu_thread_id = gpu.handle().synch(|_| Ok(thread::current().id())).unwrap();

    let asset = Arc::new(ShaderAsset::load(desc("test:threads", VERTEX, SSAO_FRAGMENT), gpu.handle()).unwrap());

    let workers: Vec<_> = (0..4).map(|i| {
        let asset = Arc::clone(&asset);
        thread::spawn(move || {
            let flags = if i % 2 == 0 { FeatureFlags::SSAO } else { FeatureFlags::empty() };
            asset.program(flags).unwrap();
            if i == 3 {
                asset.reload(data(VERTEX, SSAO_FRAGMENT)).unwrap();
            }
        })
    }).collect();
    for worker in workers {
        worker.join().unwrap();
    }

    asset.dispose().unwrap();
    assert!(mock.all_calls_from(gpu_thread_id));
    assert_eq!(mock.live_program_count(), 0);
    assert!(mock.invalid_calls().is_empty());
    drop(gpu);
}
