//! Agent task lowering
//!
//! One `agent_task` becomes one agent action step, plus an upload step
//! when the task declares an output artifact. Output schemas are rendered
//! to JSON schema here; named types are inlined from the registry.

use serde_json::{json, Map, Value};

use std::sync::Arc;

use crate::ast::{AgentTask, FieldDecl, OutputSchema, PrimitiveType, TypeDeclaration, TypeExpr};
use crate::imports::TypeScope;
use crate::ir::{SchemaIr, StepIr, StepKindIr};

use super::matrix::artifact_name;
use super::LowerContext;

pub fn lower_agent_task(
    task: &AgentTask,
    prompt: String,
    fingerprint: Option<&str>,
    ctx: &LowerContext<'_>,
) -> Vec<StepIr> {
    let allowed_tools = (!task.allowed_tools.is_empty())
        .then(|| serde_json::to_string(&task.allowed_tools).unwrap_or_else(|_| "[]".into()));

    let mut steps = vec![StepIr::new(StepKindIr::ClaudeCode {
        action: ctx.actions.agent.clone(),
        prompt,
        model: task.model.clone(),
        max_turns: task.max_turns,
        allowed_tools,
        output_schema: task
            .output_schema
            .as_ref()
            .map(|schema| render_output_schema(schema, ctx.types)),
    })];

    if let Some(artifact) = &task.output_artifact {
        steps.push(
            StepIr::new(StepKindIr::UploadArtifact {
                action: ctx.actions.upload_artifact.clone(),
                name: artifact_name(&artifact.name, fingerprint),
                path: artifact.path.clone(),
            })
            .named(format!("Upload {}", artifact.name)),
        );
    }

    steps
}

pub fn render_output_schema(schema: &OutputSchema, types: TypeScope<'_>) -> SchemaIr {
    let mut stack = Vec::new();
    let value = match schema {
        OutputSchema::FilePath(path) => return SchemaIr::File(path.clone()),
        OutputSchema::Inline(ty) => json_schema(ty, types, &mut stack),
        OutputSchema::TypeName { name, .. } => named_schema(name, types, &mut stack),
    };
    SchemaIr::Json(value.to_string())
}

/// Declarations being rendered, by identity
type Stack = Vec<*const TypeDeclaration>;

/// JSON schema for a type expression
pub fn json_schema(
    ty: &TypeExpr,
    types: TypeScope<'_>,
    stack: &mut Vec<*const TypeDeclaration>,
) -> Value {
    match ty {
        TypeExpr::Primitive(p) => json!({ "type": primitive_name(*p) }),
        TypeExpr::Null => json!({ "type": "null" }),
        TypeExpr::StringLiteral(s) => json!({ "const": s }),
        TypeExpr::Array(inner) => json!({
            "type": "array",
            "items": json_schema(inner, types, stack),
        }),
        TypeExpr::Object(fields) => object_schema(fields, types, stack),
        TypeExpr::Reference { name, .. } => named_schema(name, types, stack),
        TypeExpr::Union(members) => {
            let enumerable = members
                .iter()
                .all(|m| matches!(m, TypeExpr::StringLiteral(_) | TypeExpr::Null));
            if enumerable {
                let values: Vec<Value> = members
                    .iter()
                    .map(|m| match m {
                        TypeExpr::StringLiteral(s) => Value::String(s.clone()),
                        _ => Value::Null,
                    })
                    .collect();
                json!({ "enum": values })
            } else {
                let any: Vec<Value> = members.iter().map(|m| json_schema(m, types, stack)).collect();
                json!({ "anyOf": any })
            }
        }
    }
}

/// Fields of an imported type resolve in the file that declared it
fn named_schema(name: &str, types: TypeScope<'_>, stack: &mut Stack) -> Value {
    let Some((decl, declared)) = types.lookup(name) else {
        return json!({});
    };
    // Recursive types are cut at the second visit
    let id = Arc::as_ptr(decl);
    if stack.contains(&id) {
        return json!({ "type": "object" });
    }
    stack.push(id);
    let schema = object_schema(&decl.fields, declared, stack);
    stack.pop();
    schema
}

fn object_schema(fields: &[FieldDecl], types: TypeScope<'_>, stack: &mut Stack) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), json_schema(&field.ty, types, stack));
        if !is_nullable(&field.ty) {
            required.push(Value::String(field.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn is_nullable(ty: &TypeExpr) -> bool {
    match ty {
        TypeExpr::Null => true,
        TypeExpr::Union(members) => members.iter().any(is_nullable),
        _ => false,
    }
}

fn primitive_name(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::String => "string",
        PrimitiveType::Int => "integer",
        PrimitiveType::Float => "number",
        PrimitiveType::Bool => "boolean",
    }
}
