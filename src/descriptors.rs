//! Structured member descriptors handed to the code emitter.
//!
//! Only method bodies are literal snippets; everything else is structure.

use crate::type_resolver::TypeReference;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub type_ref: TypeReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_ref: TypeReference) -> Self {
        Self {
            name: name.into(),
            type_ref,
            default_value: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn cancellation_token() -> Self {
        Self::new("cancellationToken", TypeReference::named("CancellationToken"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub return_type: TypeReference,
    pub parameters: Vec<ParameterDescriptor>,
    pub is_async: bool,
    pub is_static: bool,
    /// Literal body; `None` for interface members
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, return_type: TypeReference) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            is_async: false,
            is_static: false,
            body: None,
        }
    }

    /// Signature as it reads in an interface, e.g. `Task<GetPetResult> GetPetAsync(...)`.
    pub fn signature(&self) -> String {
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let mut rendered = String::new();
                for attribute in &p.attributes {
                    rendered.push_str(attribute);
                    rendered.push(' ');
                }
                rendered.push_str(&format!("{} {}", p.type_ref, p.name));
                if let Some(default) = &p.default_value {
                    rendered.push_str(&format!(" = {}", default));
                }
                rendered
            })
            .collect();
        format!("{} {}({})", self.return_type, self.name, parameters.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let mut method = MethodDescriptor::new(
            "GetPetAsync",
            TypeReference::generic("Task", vec![TypeReference::named("GetPetResult")]),
        );
        method.parameters.push(
            ParameterDescriptor::new("parameters", TypeReference::named("GetPetParameters"))
                .with_attribute("[AsParameters]"),
        );
        method.parameters.push(ParameterDescriptor::cancellation_token().with_default("default"));
        assert_eq!(
            method.signature(),
            "Task<GetPetResult> GetPetAsync([AsParameters] GetPetParameters parameters, CancellationToken cancellationToken = default)"
        );
    }
}
