/// Loaded shader data: template pair and the parameters it exposes
///
/// Pure values. Nothing in here touches the GPU.

use std::sync::Arc;
use rustc_hash::FxHashSet;
use crate::gpu::ShaderStage;

// ===== TEMPLATE PAIR =====

/// Vertex and fragment template bodies of one logical shader
///
/// Immutable once built; a reload replaces the whole pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderTemplatePair {
    vertex: Arc<str>,
    fragment: Arc<str>,
}

impl ShaderTemplatePair {
    pub fn new(vertex: impl Into<Arc<str>>, fragment: impl Into<Arc<str>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Template body of `stage`
    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

// ===== PARAMETER METADATA =====

/// GLSL type of a uniform parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Bool,
    Mat3,
    Mat4,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

impl ParameterType {
    /// Parse a GLSL type keyword (None for types not exposed as parameters)
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        match keyword {
            "float" => Some(ParameterType::Float),
            "vec2" => Some(ParameterType::Vec2),
            "vec3" => Some(ParameterType::Vec3),
            "vec4" => Some(ParameterType::Vec4),
            "int" => Some(ParameterType::Int),
            "bool" => Some(ParameterType::Bool),
            "mat3" => Some(ParameterType::Mat3),
            "mat4" => Some(ParameterType::Mat4),
            "sampler2D" => Some(ParameterType::Sampler2D),
            "sampler3D" => Some(ParameterType::Sampler3D),
            "samplerCube" => Some(ParameterType::SamplerCube),
            _ => None,
        }
    }
}

/// A uniform declared by a shader template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub name: String,
    pub param_type: ParameterType,
}

/// Remove `//` and `/* */` comments, keeping line breaks
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.map_or(true, |b| l < b) => {
                out.push_str(&rest[..l]);
                rest = match rest[l..].find('\n') {
                    Some(eol) => &rest[l + eol..],
                    None => "",
                };
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                match rest[b + 2..].find("*/") {
                    Some(close) => {
                        out.push(' ');
                        rest = &rest[b + 2 + close + 2..];
                    }
                    None => rest = "",
                }
            }
            _ => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn is_qualifier(word: &str) -> bool {
    matches!(word, "highp" | "mediump" | "lowp" | "invariant" | "precise")
}

/// Collect `uniform <type> <name>[<n>];` declarations
///
/// Vertex body first, then fragment; the first declaration of a name wins.
/// Comments and preprocessor lines are ignored, and `uniform` must open the
/// statement (after a `layout(...)` or precision qualifiers).
pub fn parse_parameters(pair: &ShaderTemplatePair) -> Vec<ParameterMetadata> {
    let mut seen = FxHashSet::default();
    let mut parameters = Vec::new();

    for body in [pair.vertex(), pair.fragment()] {
        let body = strip_comments(body);
        for statement in body.split(';') {
            // A statement following a block starts after its brace
            let statement = statement.rsplit(|c: char| c == '{' || c == '}').next().unwrap_or(statement);
            let text: Vec<&str> = statement.lines()
                .filter(|line| !line.trim_start().starts_with('#'))
                .collect();
            let text = text.join(" ");
            let text = match text.trim_start().strip_prefix("layout") {
                Some(rest) => rest.split_once(')').map(|(_, after)| after).unwrap_or(""),
                None => text.as_str(),
            };
            let mut words = text.split_whitespace().skip_while(|word| is_qualifier(word));
            if words.next() != Some("uniform") {
                continue;
            }
            let mut words = words.skip_while(|word| is_qualifier(word));
            let (Some(type_word), Some(name_word)) = (words.next(), words.next()) else {
                continue;
            };
            let Some(param_type) = ParameterType::from_glsl(type_word) else {
                continue;
            };
            let name = name_word.split('[').next().unwrap_or(name_word);
            if name.is_empty() || !seen.insert(name.to_string()) {
                continue;
            }
            parameters.push(ParameterMetadata {
                name: name.to_string(),
                param_type,
            });
        }
    }

    parameters
}

// ===== SHADER DATA =====

/// Everything loaded for one logical shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderData {
    templates: ShaderTemplatePair,
    parameters: Vec<ParameterMetadata>,
}

impl ShaderData {
    /// Build shader data from a template pair, deriving its parameters
    pub fn new(templates: ShaderTemplatePair) -> Self {
        let parameters = parse_parameters(&templates);
        Self { templates, parameters }
    }

    pub fn templates(&self) -> &ShaderTemplatePair {
        &self.templates
    }

    pub fn parameters(&self) -> &[ParameterMetadata] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
#[path = "shader_data_tests.rs"]
mod tests;
