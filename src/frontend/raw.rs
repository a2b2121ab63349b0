//! Raw serde shapes of the YAML source format and their conversion to AST
//!
//! Deserialization is strict (`deny_unknown_fields`) so typos surface as
//! WP0001. Conversion is lenient: a malformed node yields a diagnostic and
//! is dropped, the rest of the tree survives.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::ast::{
    AgentJob, AgentTask, ArtifactDecl, Condition, Cycle, FieldDecl, FragmentParam, FragmentUse,
    ImportDecl, ImportItem, Job, JobDecl, JobFragment, Matrix, MatrixAxis, MatrixJob, OutputDecl,
    OutputSchema, Span, Step, StepKind, StepsFragment, Trigger, TriggerEvent, TypeDeclaration,
    TypeExpr, Workflow, WorkflowFile,
};
use crate::diagnostic::{codes, Diagnostic};

use super::expr::parse_expression;
use super::type_expr::parse_type_expr;
use super::Locator;

// ═══════════════════════════════════════════════════════════════
// RAW SHAPES
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileRaw {
    imports: Vec<ImportRaw>,
    types: Vec<TypeDeclRaw>,
    job_fragments: Vec<JobFragmentRaw>,
    steps_fragments: Vec<StepsFragmentRaw>,
    workflows: Vec<WorkflowRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImportRaw {
    from: String,
    #[serde(default)]
    types: Vec<ImportItemRaw>,
    #[serde(default)]
    job_fragments: Vec<ImportItemRaw>,
    #[serde(default)]
    steps_fragments: Vec<ImportItemRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportItemRaw {
    Name(String),
    Aliased {
        name: String,
        #[serde(rename = "as", default)]
        alias: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDeclRaw {
    name: String,
    #[serde(default)]
    fields: Vec<FieldRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldRaw {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParamRaw {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        default: Option<serde_yaml::Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobFragmentRaw {
    name: String,
    #[serde(default)]
    params: Vec<ParamRaw>,
    job: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepsFragmentRaw {
    name: String,
    #[serde(default)]
    params: Vec<ParamRaw>,
    steps: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TriggerRaw {
    Single(String),
    List(Vec<String>),
    Map(serde_yaml::Mapping),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowRaw {
    name: String,
    #[serde(default)]
    on: Option<TriggerRaw>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    jobs: Vec<JobRaw>,
    #[serde(default)]
    cycles: Vec<CycleRaw>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum NamesRaw {
    One(String),
    Many(Vec<String>),
    #[default]
    None,
}

impl NamesRaw {
    fn into_vec(self) -> Vec<String> {
        match self {
            NamesRaw::One(s) => vec![s],
            NamesRaw::Many(v) => v,
            NamesRaw::None => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum JobKindRaw {
    #[default]
    Job,
    AgentJob,
    MatrixJob,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct JobRaw {
    name: String,
    #[serde(default)]
    kind: JobKindRaw,
    #[serde(default, alias = "runs-on")]
    runs_on: Option<String>,
    #[serde(default)]
    needs: NamesRaw,
    #[serde(default)]
    after: NamesRaw,
    #[serde(default, rename = "if")]
    condition: Option<String>,
    #[serde(default)]
    outputs: Vec<OutputRaw>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    steps: Vec<StepRaw>,
    #[serde(default)]
    task: Option<AgentTaskRaw>,
    #[serde(default)]
    matrix: Option<MatrixRaw>,
    #[serde(default)]
    fragment: Option<String>,
    #[serde(default)]
    with: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, alias = "timeout-minutes")]
    timeout_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputRaw {
    name: String,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixRaw {
    #[serde(default)]
    axes: serde_yaml::Mapping,
    #[serde(default)]
    include: Vec<serde_yaml::Mapping>,
    #[serde(default)]
    exclude: Vec<serde_yaml::Mapping>,
    #[serde(default, alias = "fail-fast")]
    fail_fast: Option<bool>,
    #[serde(default, alias = "max-parallel")]
    max_parallel: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CycleRaw {
    name: String,
    #[serde(default)]
    max_iters: Option<u32>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    until: Option<String>,
    #[serde(default)]
    body: Vec<JobRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StepRaw {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "if")]
    condition: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    run: Option<String>,
    #[serde(default)]
    shell: Option<String>,
    #[serde(default)]
    uses: Option<String>,
    #[serde(default)]
    with: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    agent_task: Option<AgentTaskRaw>,
    #[serde(default)]
    download_artifact: Option<ArtifactRaw>,
    #[serde(default)]
    upload_artifact: Option<ArtifactRaw>,
    #[serde(default)]
    fragment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentTaskRaw {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_turns: Option<u32>,
    #[serde(default)]
    allowed_tools: Vec<String>,
    #[serde(default)]
    output_schema: Option<String>,
    #[serde(default)]
    output_artifact: Option<ArtifactRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactRaw {
    name: String,
    #[serde(default = "default_artifact_path")]
    path: String,
}

fn default_artifact_path() -> String {
    ".".to_string()
}

// ═══════════════════════════════════════════════════════════════
// CONVERSION
// ═══════════════════════════════════════════════════════════════

/// Converts raw shapes to AST, collecting diagnostics along the way
pub(crate) struct Converter<'a> {
    locator: Locator<'a>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            locator: Locator::new(text),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn file(&mut self, path: &str, raw: FileRaw) -> WorkflowFile {
        let imports = raw.imports.into_iter().map(|i| self.import(i)).collect();
        let types = raw.types.into_iter().filter_map(|t| self.type_decl(t)).collect();
        let job_fragments = raw
            .job_fragments
            .into_iter()
            .map(|f| JobFragment {
                span: self.locator.locate(&f.name),
                name: f.name,
                params: params(f.params),
                template: f.job,
            })
            .collect();
        let steps_fragments = raw
            .steps_fragments
            .into_iter()
            .map(|f| StepsFragment {
                span: self.locator.locate(&f.name),
                name: f.name,
                params: params(f.params),
                template: f.steps,
            })
            .collect();
        let workflows = raw.workflows.into_iter().map(|w| self.workflow(w)).collect();

        WorkflowFile {
            path: path.to_string(),
            imports,
            types,
            job_fragments,
            steps_fragments,
            workflows,
        }
    }

    fn import(&mut self, raw: ImportRaw) -> ImportDecl {
        let span = self.locator.locate(&raw.from);
        let mut items = |list: Vec<ImportItemRaw>| -> Vec<ImportItem> {
            list.into_iter()
                .map(|item| match item {
                    ImportItemRaw::Name(name) => ImportItem {
                        span: self.locator.locate(&name),
                        name,
                        alias: None,
                    },
                    ImportItemRaw::Aliased { name, alias } => ImportItem {
                        span: self.locator.locate(&name),
                        name,
                        alias,
                    },
                })
                .collect()
        };
        let types = items(raw.types);
        let job_fragments = items(raw.job_fragments);
        let steps_fragments = items(raw.steps_fragments);
        ImportDecl {
            from: raw.from,
            types,
            job_fragments,
            steps_fragments,
            span,
        }
    }

    fn type_decl(&mut self, raw: TypeDeclRaw) -> Option<TypeDeclaration> {
        let span = self.locator.locate(&raw.name);
        let mut fields = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            let field_span = self.locator.locate(&field.name);
            let ty = self.type_expr(&field.ty, field_span)?;
            fields.push(FieldDecl {
                name: field.name,
                ty,
                span: field_span,
            });
        }
        Some(TypeDeclaration {
            name: raw.name,
            fields,
            span,
        })
    }

    fn type_expr(&mut self, text: &str, span: Span) -> Option<TypeExpr> {
        match parse_type_expr(text) {
            Ok(ty) => Some(rebase_spans(ty, self.locator.locate(text).start)),
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::INVALID_TYPE_EXPR,
                        format!("invalid type expression '{}': {}", text, err.message),
                        span,
                    )
                    .with_hint(format!("error at offset {} of the type expression", err.offset)),
                );
                None
            }
        }
    }

    fn workflow(&mut self, raw: WorkflowRaw) -> Workflow {
        let span = self.locator.locate(&raw.name);
        let trigger = match raw.on {
            Some(on) => self.trigger(on),
            None => Trigger::default(),
        };
        let jobs = raw.jobs.into_iter().filter_map(|j| self.job(j)).collect();
        let cycles = raw.cycles.into_iter().map(|c| self.cycle(c)).collect();
        Workflow {
            name: raw.name,
            trigger,
            env: raw.env,
            jobs,
            cycles,
            span,
        }
    }

    fn trigger(&mut self, raw: TriggerRaw) -> Trigger {
        let events = match raw {
            TriggerRaw::Single(name) => vec![TriggerEvent { name, config: None }],
            TriggerRaw::List(names) => names
                .into_iter()
                .map(|name| TriggerEvent { name, config: None })
                .collect(),
            TriggerRaw::Map(map) => map
                .into_iter()
                .filter_map(|(key, value)| {
                    let name = key.as_str()?.to_string();
                    let config = match value {
                        serde_yaml::Value::Null => None,
                        other => yaml_to_json(&other),
                    };
                    Some(TriggerEvent { name, config })
                })
                .collect(),
        };
        Trigger { events }
    }

    fn cycle(&mut self, raw: CycleRaw) -> Cycle {
        let span = self.locator.locate(&raw.name);
        let body = raw.body.into_iter().filter_map(|j| self.job(j)).collect();
        Cycle {
            name: raw.name,
            max_iters: raw.max_iters,
            key: raw.key,
            until: raw.until,
            body,
            span,
        }
    }

    fn condition(&mut self, raw: String, span: Span) -> Condition {
        match parse_expression(&raw) {
            Ok(expr) => Condition {
                raw,
                expr: Some(expr),
                span,
            },
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::warning(
                        codes::INVALID_EXPRESSION,
                        format!("could not parse condition '{}': {}", raw, err.message),
                        span,
                    )
                    .with_hint("the condition is emitted verbatim but not type-checked"),
                );
                Condition {
                    raw,
                    expr: None,
                    span,
                }
            }
        }
    }

    pub(crate) fn job(&mut self, raw: JobRaw) -> Option<JobDecl> {
        let span = self.locator.locate(&raw.name);
        let condition = raw.condition.map(|c| self.condition(c, span));

        if let Some(fragment) = raw.fragment {
            let args = raw
                .with
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(&v)))
                .collect();
            return Some(JobDecl::Fragment(FragmentUse {
                name: raw.name,
                fragment,
                args,
                needs: merge_names(raw.needs.into_vec(), raw.after.into_vec()),
                condition,
                span,
            }));
        }

        let mut steps: Vec<Step> = raw.steps.into_iter().filter_map(|s| self.step(s)).collect();
        if let Some(task) = raw.task {
            let mut step = Step::new(StepKind::AgentTask(self.agent_task(task, span)));
            step.span = span;
            steps.push(step);
        }
        let outputs = raw
            .outputs
            .into_iter()
            .map(|o| {
                let out_span = self.locator.locate(&o.name);
                OutputDecl {
                    ty: o.ty.as_deref().and_then(|t| self.type_expr(t, out_span)),
                    name: o.name,
                    value: o.value,
                    span: out_span,
                }
            })
            .collect();

        let deps = merge_names(raw.needs.into_vec(), raw.after.into_vec());

        if raw.kind == JobKindRaw::AgentJob {
            return Some(JobDecl::Agent(AgentJob {
                name: raw.name,
                runs_on: raw.runs_on,
                after: deps,
                condition,
                outputs,
                env: raw.env,
                steps,
                timeout_minutes: raw.timeout_minutes,
                span,
            }));
        }

        let job = Job {
            name: raw.name,
            runs_on: raw.runs_on,
            needs: deps,
            condition,
            outputs,
            env: raw.env,
            steps,
            timeout_minutes: raw.timeout_minutes,
            span,
        };

        match raw.matrix {
            Some(matrix) => {
                let matrix = self.matrix(matrix, span);
                Some(JobDecl::Matrix(MatrixJob { job, matrix }))
            }
            None if raw.kind == JobKindRaw::MatrixJob => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::INVALID_NODE,
                        format!("matrix_job '{}' has no matrix", job.name),
                        span,
                    )
                    .with_hint("add a `matrix: { axes: ... }` block or drop `kind: matrix_job`"),
                );
                Some(JobDecl::Job(job))
            }
            None => Some(JobDecl::Job(job)),
        }
    }

    fn matrix(&mut self, raw: MatrixRaw, span: Span) -> Matrix {
        let mut axes = Vec::with_capacity(raw.axes.len());
        for (key, value) in raw.axes {
            let Some(name) = key.as_str().map(str::to_string) else {
                self.diagnostics.push(Diagnostic::error(
                    codes::INVALID_NODE,
                    "matrix axis names must be strings",
                    span,
                ));
                continue;
            };
            let values = match value {
                serde_yaml::Value::Sequence(seq) => seq.iter().filter_map(yaml_to_json).collect(),
                other => {
                    self.diagnostics.push(
                        Diagnostic::error(
                            codes::INVALID_NODE,
                            format!("matrix axis '{}' must be a list", name),
                            span,
                        )
                        .with_hint(format!("write `{}: [{}]`", name, scalar_to_string(&other))),
                    );
                    continue;
                }
            };
            axes.push(MatrixAxis { name, values });
        }

        let entries = |list: Vec<serde_yaml::Mapping>| -> Vec<serde_json::Map<String, Value>> {
            list.iter()
                .filter_map(|m| match yaml_to_json(&serde_yaml::Value::Mapping(m.clone())) {
                    Some(Value::Object(obj)) => Some(obj),
                    _ => None,
                })
                .collect()
        };

        Matrix {
            axes,
            include: entries(raw.include),
            exclude: entries(raw.exclude),
            fail_fast: raw.fail_fast,
            max_parallel: raw.max_parallel,
            span,
        }
    }

    pub(crate) fn step(&mut self, raw: StepRaw) -> Option<Step> {
        let span = raw
            .name
            .as_deref()
            .or(raw.id.as_deref())
            .map(|n| self.locator.locate(n))
            .unwrap_or_default();

        let kinds = [
            raw.run.is_some(),
            raw.uses.is_some(),
            raw.script.is_some(),
            raw.agent_task.is_some(),
            raw.download_artifact.is_some(),
            raw.upload_artifact.is_some(),
            raw.fragment.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if kinds != 1 {
            let label = raw.name.as_deref().or(raw.id.as_deref()).unwrap_or("<unnamed>");
            self.diagnostics.push(
                Diagnostic::error(
                    codes::INVALID_NODE,
                    format!(
                        "step '{}' must declare exactly one of run, uses, script, agent_task, \
                         download_artifact, upload_artifact, fragment (found {})",
                        label, kinds
                    ),
                    span,
                ),
            );
            return None;
        }

        let with: BTreeMap<String, Value> = raw
            .with
            .iter()
            .filter_map(|(k, v)| yaml_to_json(v).map(|v| (k.clone(), v)))
            .collect();

        let kind = if let Some(command) = raw.run {
            StepKind::Run {
                command,
                shell: raw.shell,
            }
        } else if let Some(action) = raw.uses {
            StepKind::Uses { action, with }
        } else if let Some(code) = raw.script {
            StepKind::Script { code }
        } else if let Some(task) = raw.agent_task {
            StepKind::AgentTask(self.agent_task(task, span))
        } else if let Some(a) = raw.download_artifact {
            StepKind::DownloadArtifact(ArtifactDecl {
                name: a.name,
                path: a.path,
            })
        } else if let Some(a) = raw.upload_artifact {
            StepKind::UploadArtifact(ArtifactDecl {
                name: a.name,
                path: a.path,
            })
        } else {
            StepKind::Fragment {
                fragment: raw.fragment.unwrap_or_default(),
                args: raw
                    .with
                    .iter()
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect(),
            }
        };

        Some(Step {
            name: raw.name,
            id: raw.id,
            condition: raw.condition,
            env: raw.env,
            kind,
            span,
        })
    }

    fn agent_task(&mut self, raw: AgentTaskRaw, span: Span) -> AgentTask {
        let output_schema = raw
            .output_schema
            .and_then(|schema| self.output_schema(schema, span));
        AgentTask {
            prompt: raw.prompt,
            model: raw.model,
            max_turns: raw.max_turns,
            allowed_tools: raw.allowed_tools,
            output_schema,
            output_artifact: raw.output_artifact.map(|a| ArtifactDecl {
                name: a.name,
                path: a.path,
            }),
        }
    }

    fn output_schema(&mut self, schema: String, span: Span) -> Option<OutputSchema> {
        let trimmed = schema.trim();
        if trimmed.starts_with('{') {
            self.type_expr(trimmed, span).map(OutputSchema::Inline)
        } else if trimmed.contains('/') || trimmed.ends_with(".json") {
            Some(OutputSchema::FilePath(trimmed.to_string()))
        } else {
            let name_span = self.locator.locate(trimmed);
            Some(OutputSchema::TypeName {
                name: trimmed.to_string(),
                span: name_span,
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════

fn params(raw: Vec<ParamRaw>) -> Vec<FragmentParam> {
    raw.into_iter()
        .map(|p| match p {
            ParamRaw::Name(name) => FragmentParam {
                name,
                default: None,
            },
            ParamRaw::Full { name, default } => FragmentParam {
                name,
                default: default.as_ref().map(scalar_to_string),
            },
        })
        .collect()
}

/// `needs` followed by `after`, de-duplicated, first occurrence wins
fn merge_names(needs: Vec<String>, after: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(needs.len() + after.len());
    for name in needs.into_iter().chain(after) {
        if !merged.contains(&name) {
            merged.push(name);
        }
    }
    merged
}

/// Shift type-expression reference spans from expression-relative to file offsets
fn rebase_spans(ty: TypeExpr, base: usize) -> TypeExpr {
    match ty {
        TypeExpr::Reference { name, span } => TypeExpr::Reference {
            name,
            span: Span::new(span.start + base, span.end + base),
        },
        TypeExpr::Array(inner) => TypeExpr::Array(Box::new(rebase_spans(*inner, base))),
        TypeExpr::Object(fields) => TypeExpr::Object(
            fields
                .into_iter()
                .map(|f| FieldDecl {
                    name: f.name,
                    ty: rebase_spans(f.ty, base),
                    span: Span::new(f.span.start + base, f.span.end + base),
                })
                .collect(),
        ),
        TypeExpr::Union(members) => {
            TypeExpr::Union(members.into_iter().map(|m| rebase_spans(m, base)).collect())
        }
        other => other,
    }
}

pub(crate) fn yaml_to_json(value: &serde_yaml::Value) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Render a YAML scalar as argument text; collections become compact JSON
pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => yaml_to_json(other)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_names_dedups_in_order() {
        let merged = merge_names(
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into(), "a".into()],
        );
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn scalar_rendering() {
        assert_eq!(scalar_to_string(&serde_yaml::Value::from(20)), "20");
        assert_eq!(scalar_to_string(&serde_yaml::Value::from(true)), "true");
        let seq: serde_yaml::Value = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(scalar_to_string(&seq), r#"["a","b"]"#);
    }

    #[test]
    fn rebase_shifts_nested_references() {
        let ty = TypeExpr::Array(Box::new(TypeExpr::Reference {
            name: "X".into(),
            span: Span::new(0, 1),
        }));
        let TypeExpr::Array(inner) = rebase_spans(ty, 10) else {
            panic!("expected array");
        };
        assert_eq!(
            *inner,
            TypeExpr::Reference {
                name: "X".into(),
                span: Span::new(10, 11)
            }
        );
    }
}
