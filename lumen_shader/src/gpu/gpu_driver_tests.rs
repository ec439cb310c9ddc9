//! Unit tests for gpu_driver.rs

use crate::gpu::{ShaderStage, StageHandle, ProgramHandle};

#[test]
fn test_stage_names() {
    assert_eq!(ShaderStage::Vertex.name(), "vertex");
    assert_eq!(ShaderStage::Fragment.name(), "fragment");
}

#[test]
fn test_stage_all_is_vertex_first() {
    assert_eq!(ShaderStage::ALL, [ShaderStage::Vertex, ShaderStage::Fragment]);
}

#[test]
fn test_handles_round_trip_raw_value() {
    assert_eq!(StageHandle::from_raw(7).raw(), 7);
    assert_eq!(ProgramHandle::from_raw(9).raw(), 9);
    assert_ne!(StageHandle::from_raw(1), StageHandle::from_raw(2));
}
