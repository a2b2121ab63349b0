//! Shared helpers for integration tests

#![allow(dead_code)]

use gantry::{CompileResult, Compiler, Diagnostic, WorkflowIr};

/// Compile one self-contained source
pub fn compile(text: &str) -> CompileResult<String> {
    compile_files("main.yaml", text, &[])
}

/// Compile an entry source with extra files available to imports
pub fn compile_files(entry: &str, text: &str, files: &[(&str, &str)]) -> CompileResult<String> {
    Compiler::default()
        .compile_source(entry, text, files)
        .expect("in-memory compile does not hit infrastructure errors")
}

/// Lower without emitting
pub fn build_ir(text: &str) -> WorkflowIr {
    let resolution = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(
            gantry::ImportResolver::new(gantry::MemoryLoader::new())
                .resolve_source("main.yaml", text),
        );
    match Compiler::default().build_ir(&resolution) {
        CompileResult::Success { value, .. } => value,
        CompileResult::Failure { diagnostics } => panic!("compile failed: {:#?}", diagnostics),
    }
}

/// Codes of all diagnostics, in report order
pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
    diagnostics.iter().map(|d| d.code).collect()
}

/// A three-job review pipeline with an agent job and a bounded cycle
pub const REVIEW_PIPELINE: &str = r#"
types:
  - name: Review
    fields:
      - { name: score, type: int }
      - { name: verdict, type: '"approve" | "reject" | null' }
workflows:
  - name: review
    on: pull_request
    jobs:
      - name: build
        runs_on: ubuntu-latest
        outputs:
          - { name: artifact, value: "${{ steps.pack.outputs.path }}" }
        steps:
          - { id: pack, run: make dist }
      - name: triage
        kind: agent_job
        after: [build]
        runs_on: ubuntu-latest
        steps:
          - agent_task:
              prompt: "Triage ${{ needs.build.outputs.artifact }}"
              model: sonnet
              max_turns: 5
              allowed_tools: [Read, Grep]
              output_schema: Review
              output_artifact: { name: triage, path: triage.json }
      - name: publish
        runs_on: ubuntu-latest
        needs: [refine]
        steps:
          - run: "echo ${{ needs.refine.outputs.termination_reason }}"
    cycles:
      - name: refine
        max_iters: 3
        until: "ctx.outputs.review.approved === 'true'"
        body:
          - name: review
            runs_on: ubuntu-latest
            outputs:
              - { name: approved, value: "${{ steps.r.outputs.approved }}" }
            steps:
              - { id: r, run: ./review.sh }
          - name: fix
            runs_on: ubuntu-latest
            needs: [review]
            if: "needs.review.outputs.approved != 'true'"
            steps:
              - run: ./fix.sh
"#;
