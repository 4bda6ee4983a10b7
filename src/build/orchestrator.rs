use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cancel::CancelToken;
use super::plan::plan_data_tables;
use super::sink::{checksum, ArtifactSink};
use super::types::*;
use crate::codegen::{self, proto, resolve_language, Language};
use crate::compile::{CompiledTable, RecordBuilder, TableRegistry, TargetFilter};
use crate::error::{CompileError, Result};
use crate::export::{artifact_file_name, serializer_for, OutputFormat};
use crate::schema::{parse_sheet, EnumTable, ParsedSheet, TableSchema};
use crate::sheet::{discover_workspace, read_sheets, Sheet, SheetKind};

/// Report plus the registry the run populated. After a cancelled or failed run the registry
/// holds exactly the tables that compiled.
#[derive(Debug)]
pub struct BuildOutcome {
    pub report: BuildReport,
    pub registry: TableRegistry,
}

/// A build target whose language and format tags resolved
#[derive(Debug, Clone)]
pub struct ResolvedTarget<'a> {
    pub target: &'a BuildTarget,
    pub language: &'static Language,
    pub format: OutputFormat,
    pub filter: TargetFilter,
}

/// Validate a target's tags. The platform tag defaults to the language keyword.
pub fn resolve_target(target: &BuildTarget) -> Result<ResolvedTarget<'_>> {
    let language = resolve_language(&target.language).ok_or_else(|| {
        CompileError::target_config(format!("unknown language '{}'", target.language))
    })?;
    let format = OutputFormat::parse(&target.format).ok_or_else(|| {
        CompileError::target_config(format!("unsupported output format '{}'", target.format))
    })?;
    if target.generate_code && target.code_path.is_none() {
        return Err(CompileError::target_config(
            "code generation is enabled but no code path is set",
        ));
    }

    let platform = target.platform.as_deref().unwrap_or(language.keyword);
    Ok(ResolvedTarget {
        target,
        language,
        format,
        filter: TargetFilter::for_tag(platform),
    })
}

/// Drives one compile run: aux tables, then DATA tables in link order, then every
/// (table, target) export.
pub struct BuildOrchestrator {
    config: BuildConfig,
    sink: Arc<dyn ArtifactSink>,
    cancel: CancelToken,
}

/// Mutable state of one run
#[derive(Default)]
struct Run {
    stage: Option<BuildStage>,
    registry: TableRegistry,
    diagnostics: Vec<Diagnostic>,
    artifacts: Vec<Artifact>,
    failed: BTreeSet<String>,
}

impl Run {
    fn stage(&self) -> BuildStage {
        self.stage.unwrap_or(BuildStage::Idle)
    }

    fn enter(&mut self, stage: BuildStage) {
        tracing::info!(stage = %stage, "build stage");
        self.stage = Some(stage);
    }

    fn fail_table(&mut self, table: &str, error: CompileError, stage: BuildStage) {
        tracing::warn!(table, "{}", error);
        self.failed.insert(table.to_string());
        self.diagnostics
            .push(Diagnostic::from_error(error, stage).for_table(table));
    }

    fn finish(mut self) -> BuildOutcome {
        let stage = if self.diagnostics.is_empty() {
            BuildStage::Done
        } else {
            BuildStage::Failed
        };
        self.enter(stage);
        tracing::info!(
            tables = self.registry.len(),
            artifacts = self.artifacts.len(),
            diagnostics = self.diagnostics.len(),
            "build finished"
        );
        self.outcome(stage, false)
    }

    fn cancelled(mut self) -> BuildOutcome {
        let stage = self.stage();
        tracing::warn!(stage = %stage, "build cancelled");
        self.diagnostics
            .push(Diagnostic::from_error(CompileError::cancelled(), stage));
        self.outcome(BuildStage::Failed, true)
    }

    fn outcome(self, stage: BuildStage, cancelled: bool) -> BuildOutcome {
        BuildOutcome {
            report: BuildReport {
                stage,
                tables: self.registry.names(),
                artifacts: self.artifacts,
                diagnostics: self.diagnostics,
                cancelled,
            },
            registry: self.registry,
        }
    }
}

/// Result of one (table, target) export job
struct JobOutcome {
    artifacts: Vec<Artifact>,
    diagnostic: Option<Diagnostic>,
}

enum ExportItem {
    Table(Arc<CompiledTable>),
    Enum(Arc<EnumTable>),
}

impl ExportItem {
    fn name(&self) -> &str {
        match self {
            ExportItem::Table(table) => table.name(),
            ExportItem::Enum(table) => &table.name,
        }
    }
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig, sink: Arc<dyn ArtifactSink>) -> Self {
        BuildOrchestrator {
            config,
            sink,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels runs of this orchestrator
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Discover, read and compile every sheet under `root`.
    pub fn run_workspace(&self, root: &Path) -> BuildOutcome {
        let pool = self.thread_pool();
        let mut run = Run::default();

        let sources = match discover_workspace(root) {
            Ok(sources) => sources,
            Err(err) => {
                tracing::warn!("{}", err);
                run.diagnostics
                    .push(Diagnostic::from_error(err, BuildStage::Idle));
                return run.finish();
            }
        };
        tracing::info!(root = %root.display(), sources = sources.len(), "discovered sheets");

        let read = par_map(pool.as_ref(), &sources, |source| read_sheets(source));
        let mut sheets = Vec::new();
        for (source, result) in sources.iter().zip(read) {
            match result {
                Ok(mut found) => sheets.append(&mut found),
                Err(err) => {
                    let stem = source
                        .path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default();
                    run.fail_table(&stem, err, BuildStage::Idle);
                }
            }
        }

        self.execute(pool.as_ref(), sheets, run)
    }

    /// Compile sheets that were already read.
    pub fn run(&self, sheets: Vec<Sheet>) -> BuildOutcome {
        let pool = self.thread_pool();
        self.execute(pool.as_ref(), sheets, Run::default())
    }

    fn thread_pool(&self) -> Option<ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.config.jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        match builder.build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("thread pool unavailable, compiling on one thread: {}", e);
                None
            }
        }
    }

    fn execute(&self, pool: Option<&ThreadPool>, sheets: Vec<Sheet>, mut run: Run) -> BuildOutcome {
        run.enter(BuildStage::ParsingAux);
        let sheets = reject_duplicate_names(sheets, &mut run);

        // Schemas of every sheet, in parallel
        let parsed = par_map(pool, &sheets, |sheet| {
            self.cancel.check()?;
            tracing::debug!(sheet = %sheet.name, kind = %sheet.kind, "parsing schema");
            parse_sheet(sheet)
        });
        if self.cancel.is_cancelled() {
            return run.cancelled();
        }

        let mut enums: Vec<EnumTable> = Vec::new();
        let mut kvs: Vec<(TableSchema, &Sheet)> = Vec::new();
        let mut data: Vec<(TableSchema, &Sheet)> = Vec::new();
        for (sheet, result) in sheets.iter().zip(parsed) {
            match result {
                Ok(ParsedSheet::Enum(table)) => enums.push(table),
                Ok(ParsedSheet::Table(schema)) if schema.kind == SheetKind::Kv => {
                    kvs.push((schema, sheet))
                }
                Ok(ParsedSheet::Table(schema)) => data.push((schema, sheet)),
                Err(err) => {
                    let stage = if sheet.kind.is_auxiliary() {
                        BuildStage::ParsingAux
                    } else {
                        BuildStage::ParsingData
                    };
                    run.fail_table(&sheet.name, err, stage);
                }
            }
        }

        // ENUM tables first; KV fields may reference them
        enums.sort_by(|a, b| a.name.cmp(&b.name));
        for table in enums {
            let name = table.name.clone();
            tracing::debug!(table = %name, symbols = table.entries.len(), "registered enum");
            if let Err(err) = run.registry.insert_enum(table) {
                run.fail_table(&name, err.in_sheet(&name), BuildStage::ParsingAux);
            }
        }

        kvs.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        let built = {
            let registry = &run.registry;
            par_map(pool, &kvs, |(schema, sheet)| {
                self.cancel.check()?;
                RecordBuilder::new(registry).build(schema, sheet)
            })
        };
        if self.cancel.is_cancelled() {
            return run.cancelled();
        }
        self.register(&mut run, kvs.iter().map(|(s, _)| s.name.as_str()), built, BuildStage::ParsingAux);

        run.enter(BuildStage::ParsingData);
        let schemas: Vec<&TableSchema> = data.iter().map(|(schema, _)| schema).collect();
        let plan = plan_data_tables(&schemas, &run.registry, &run.failed);
        for (name, err) in plan.failures {
            run.fail_table(&name, err, BuildStage::ParsingData);
        }

        let by_name: BTreeMap<&str, &(TableSchema, &Sheet)> =
            data.iter().map(|entry| (entry.0.name.as_str(), entry)).collect();
        for wave in &plan.waves {
            if self.cancel.is_cancelled() {
                return run.cancelled();
            }

            // A table from an earlier wave may have failed while building
            let mut ready: Vec<&(TableSchema, &Sheet)> = Vec::new();
            for name in wave {
                let Some(entry) = by_name.get(name.as_str()) else {
                    continue;
                };
                let broken = entry
                    .0
                    .link_dependencies()
                    .into_iter()
                    .find(|dep| run.failed.contains(dep));
                match broken {
                    Some(dep) => run.fail_table(
                        name,
                        CompileError::unresolved(format!(
                            "linked table '{}' failed to compile",
                            dep
                        ))
                        .in_sheet(name),
                        BuildStage::ParsingData,
                    ),
                    None => ready.push(*entry),
                }
            }

            let built = {
                let registry = &run.registry;
                par_map(pool, &ready, |entry| {
                    self.cancel.check()?;
                    tracing::debug!(table = %entry.0.name, "building records");
                    RecordBuilder::new(registry).build(&entry.0, entry.1)
                })
            };
            if self.cancel.is_cancelled() {
                return run.cancelled();
            }
            self.register(&mut run, ready.iter().map(|e| e.0.name.as_str()), built, BuildStage::ParsingData);
        }

        run.enter(BuildStage::Filtering);
        let targets = self.resolve_targets(&mut run);

        let mut jobs: Vec<(ExportItem, &ResolvedTarget)> = Vec::new();
        for target in &targets {
            for table in run.registry.tables() {
                jobs.push((ExportItem::Table(Arc::clone(table)), target));
            }
            if target.target.generate_code {
                for table in run.registry.enums() {
                    jobs.push((ExportItem::Enum(Arc::clone(table)), target));
                }
            }
        }
        tracing::info!(targets = targets.len(), jobs = jobs.len(), "exporting");

        let outcomes = par_map(pool, &jobs, |(item, target)| {
            if self.cancel.is_cancelled() {
                return None;
            }
            Some(self.export(item, target))
        });
        for outcome in outcomes.into_iter().flatten() {
            run.artifacts.extend(outcome.artifacts);
            if let Some(diagnostic) = outcome.diagnostic {
                tracing::warn!("{}", diagnostic);
                run.diagnostics.push(diagnostic);
            }
        }
        if self.cancel.is_cancelled() {
            return run.cancelled();
        }

        run.finish()
    }

    /// Insert built tables into the registry, one writer, in the given order.
    fn register<'n>(
        &self,
        run: &mut Run,
        names: impl Iterator<Item = &'n str>,
        built: Vec<Result<CompiledTable>>,
        stage: BuildStage,
    ) {
        for (name, result) in names.zip(built) {
            let inserted = result.and_then(|table| {
                let records = table.records.len();
                run.registry.insert_table(table).map(|_| records)
            });
            match inserted {
                Ok(records) => tracing::debug!(table = name, records, "compiled table"),
                Err(err) => run.fail_table(name, err.in_sheet(name), stage),
            }
        }
    }

    fn resolve_targets(&self, run: &mut Run) -> Vec<ResolvedTarget<'_>> {
        let mut resolved = Vec::new();
        for target in self.config.enabled_targets() {
            match resolve_target(target) {
                Ok(target) => resolved.push(target),
                Err(err) => {
                    tracing::warn!(target = %target.display_name, "{}", err);
                    run.diagnostics.push(
                        Diagnostic::from_error(err, BuildStage::Filtering)
                            .for_target(&target.display_name),
                    );
                }
            }
        }
        resolved
    }

    fn export(&self, item: &ExportItem, target: &ResolvedTarget<'_>) -> JobOutcome {
        let mut outcome = JobOutcome {
            artifacts: Vec::new(),
            diagnostic: None,
        };
        let name = item.name().to_string();
        let fail = |err: CompileError, stage: BuildStage| {
            Diagnostic::from_error(err, stage)
                .for_table(&name)
                .for_target(&target.target.display_name)
        };

        match item {
            ExportItem::Table(table) => {
                let schema = target.filter.project(&table.schema);

                let bytes = match serializer_for(target.format).serialize(&schema, &table.records) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        outcome.diagnostic = Some(fail(err, BuildStage::Serializing));
                        return outcome;
                    }
                };
                let path = target
                    .target
                    .output_path
                    .join(artifact_file_name(&schema.name, target.format));
                match self.emit(&name, target.target, ArtifactKind::Data, path, &bytes) {
                    Ok(artifact) => outcome.artifacts.push(artifact),
                    Err(err) => {
                        outcome.diagnostic = Some(fail(err, BuildStage::Serializing));
                        return outcome;
                    }
                }

                if self.cancel.is_cancelled() {
                    return outcome;
                }
                if let (true, Some(code_path)) =
                    (target.target.generate_code, &target.target.code_path)
                {
                    let generated = codegen::generate_table(&schema, target.language)
                        .and_then(|source| {
                            let path = code_path.join(&source.file_name);
                            self.emit(&name, target.target, ArtifactKind::Source, path, source.text.as_bytes())
                        });
                    match generated {
                        Ok(artifact) => outcome.artifacts.push(artifact),
                        Err(err) => {
                            outcome.diagnostic = Some(fail(err, BuildStage::CodeGenerating));
                            return outcome;
                        }
                    }

                    if target.format == OutputFormat::Binary {
                        let generated = proto::generate_proto_table(&schema).and_then(|source| {
                            let path = code_path.join(&source.file_name);
                            self.emit(&name, target.target, ArtifactKind::Schema, path, source.text.as_bytes())
                        });
                        match generated {
                            Ok(artifact) => outcome.artifacts.push(artifact),
                            Err(err) => outcome.diagnostic = Some(fail(err, BuildStage::CodeGenerating)),
                        }
                    }
                }
            }
            ExportItem::Enum(table) => {
                let Some(code_path) = &target.target.code_path else {
                    return outcome;
                };
                let generated = codegen::generate_enum(table, target.language).and_then(|source| {
                    let path = code_path.join(&source.file_name);
                    self.emit(&name, target.target, ArtifactKind::Source, path, source.text.as_bytes())
                });
                match generated {
                    Ok(artifact) => outcome.artifacts.push(artifact),
                    Err(err) => {
                        outcome.diagnostic = Some(fail(err, BuildStage::CodeGenerating));
                        return outcome;
                    }
                }

                if target.format == OutputFormat::Binary {
                    let generated = proto::generate_proto_enum(table).and_then(|source| {
                        let path = code_path.join(&source.file_name);
                        self.emit(&name, target.target, ArtifactKind::Schema, path, source.text.as_bytes())
                    });
                    match generated {
                        Ok(artifact) => outcome.artifacts.push(artifact),
                        Err(err) => outcome.diagnostic = Some(fail(err, BuildStage::CodeGenerating)),
                    }
                }
            }
        }

        outcome
    }

    fn emit(
        &self,
        table: &str,
        target: &BuildTarget,
        kind: ArtifactKind,
        path: PathBuf,
        bytes: &[u8],
    ) -> Result<Artifact> {
        self.sink
            .write(&path, bytes)
            .map_err(|e| e.in_sheet(table))?;
        tracing::debug!(
            table,
            target = %target.display_name,
            path = %path.display(),
            size = bytes.len(),
            "wrote artifact"
        );
        Ok(Artifact {
            table: table.to_string(),
            target: target.display_name.clone(),
            kind,
            size: bytes.len(),
            sha256: checksum(bytes),
            path,
        })
    }
}

/// Drop every sheet whose name is shared with another sheet.
fn reject_duplicate_names(sheets: Vec<Sheet>, run: &mut Run) -> Vec<Sheet> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for sheet in &sheets {
        *counts.entry(sheet.name.clone()).or_default() += 1;
    }
    for (name, count) in &counts {
        if *count > 1 {
            run.fail_table(
                name,
                CompileError::duplicate_key(format!(
                    "sheet name '{}' is used by {} sheets",
                    name, count
                ))
                .in_sheet(name),
                BuildStage::ParsingAux,
            );
        }
    }
    sheets
        .into_iter()
        .filter(|sheet| counts.get(&sheet.name).copied().unwrap_or(0) == 1)
        .collect()
}

/// Order-preserving map over `items`, on the pool when there is one.
fn par_map<T, R, F>(pool: Option<&ThreadPool>, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    match pool {
        Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        None => items.iter().map(f).collect(),
    }
}
