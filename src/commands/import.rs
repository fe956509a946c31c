use std::io::Write;

use anyhow::Context;
use dialoguer::{
    Select,
    console::{Term, style},
};
use jiff::civil;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{debug, info, warn};

use crate::{
    entities::movie,
    importer::{ImportError, MovieImporter},
    omdb::{LookupError, MovieSource, OmdbMovie, SearchResult},
};

/// Operator decision after a title search.
pub trait CandidatePicker {
    /// Index into `candidates`, or `None` for "none of the above".
    fn pick(&mut self, query: &str, candidates: &[SearchResult]) -> anyhow::Result<Option<usize>>;
}

/// Asks on the terminal with an arrow-key menu.
pub struct TerminalPicker {
    term: Term,
}

impl TerminalPicker {
    pub fn new() -> Self {
        Self { term: Term::stderr() }
    }
}

impl CandidatePicker for TerminalPicker {
    fn pick(&mut self, _query: &str, candidates: &[SearchResult]) -> anyhow::Result<Option<usize>> {
        let mut labels: Vec<String> = candidates.iter().map(SearchResult::label).collect();
        labels.push("None of the above.".to_string());

        let choice = Select::new()
            .with_prompt("Which movie would you like to import?")
            .items(&labels)
            .default(0)
            .interact_on(&self.term)?;

        Ok((choice < candidates.len()).then_some(choice))
    }
}

/// Used with `--no-interaction`: every candidate list is declined.
pub struct DeclineAll;

impl CandidatePicker for DeclineAll {
    fn pick(&mut self, _query: &str, _candidates: &[SearchResult]) -> anyhow::Result<Option<usize>> {
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("no results")]
    NoResults,

    #[error("no candidate selected")]
    NoCandidateSelected,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("could not ask which movie to import: {0}")]
    Prompt(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImportedRow {
    pub query: String,
    pub id: i32,
    pub title: String,
    pub year: Option<i16>,
}

impl ImportedRow {
    fn new(query: &str, movie: &movie::Model) -> Self {
        Self {
            query: query.to_string(),
            id: movie.id,
            title: movie.title.clone(),
            year: movie.released_at.parse::<civil::Date>().ok().map(|d| d.year()),
        }
    }

    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FailedRow {
    pub query: String,
    pub reason: FailureReason,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<ImportedRow>,
    pub failed: Vec<FailedRow>,
    pub saved: bool,
}

impl ImportReport {
    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        if !self.imported.is_empty() {
            writeln!(out, "\n{}", style("[OK] The following movies were imported.").green().bold())?;
            let rows: Vec<Vec<String>> = self
                .imported
                .iter()
                .map(|row| vec![row.id.to_string(), row.label(), row.query.clone()])
                .collect();
            out.write_all(table(&["ID", "Title", "Query"], &rows).as_bytes())?;
        }

        if !self.failed.is_empty() {
            writeln!(out, "\n{}", style("[WARNING] The following terms were not conclusive.").yellow().bold())?;
            let rows: Vec<Vec<String>> = self
                .failed
                .iter()
                .map(|row| vec![row.query.clone(), row.reason.to_string()])
                .collect();
            out.write_all(table(&["Query", "Reason"], &rows).as_bytes())?;
        }

        Ok(())
    }
}

/// Imports a batch of IMDb ids or titles.
///
/// Each token is first tried as an id. When OMDb knows no such id the token
/// is searched as a title and the picker chooses among the candidates. A
/// token's failure never stops the batch. All tokens are resolved first; the
/// records are then written in one transaction, committed unless `dry_run`.
pub struct ImportCommand<'a, S: ?Sized, W> {
    source: &'a S,
    importer: MovieImporter,
    picker: Box<dyn CandidatePicker + 'a>,
    out: W,
}

impl<'a, S, W> ImportCommand<'a, S, W>
where
    S: MovieSource + ?Sized,
    W: Write,
{
    pub fn new(source: &'a S, picker: Box<dyn CandidatePicker + 'a>, out: W) -> Self {
        Self { source, importer: MovieImporter, picker, out }
    }

    pub async fn run(
        &mut self,
        db: &DatabaseConnection,
        tokens: &[String],
        dry_run: bool,
    ) -> anyhow::Result<ImportReport> {
        writeln!(self.out, "{}", style("Import movies from OMDb").cyan().bold())?;
        writeln!(self.out, "Trying to import {} movies into the database.", tokens.len())?;

        // Every lookup and prompt happens before the write transaction opens,
        // so an operator sitting on a menu never holds the database lock.
        let mut resolved = Vec::with_capacity(tokens.len());
        for token in tokens {
            writeln!(self.out, "\n{} {token}", style("Trying >>>").bold())?;
            resolved.push((token, self.resolve(token).await));
        }

        let txn = db.begin().await.context("starting the import transaction")?;
        let mut report = ImportReport::default();

        for (token, resolution) in resolved {
            let outcome = match resolution {
                Ok(record) => self.importer.import(&txn, &record, false).await.map_err(FailureReason::from),
                Err(reason) => Err(reason),
            };

            match outcome {
                Ok(movie) => {
                    info!(query = %token, id = movie.id, slug = %movie.slug, "imported");
                    report.imported.push(ImportedRow::new(token, &movie));
                },
                Err(reason) => {
                    warn!(query = %token, reason = %reason, "not imported");
                    report.failed.push(FailedRow { query: token.clone(), reason });
                },
            }
        }

        if dry_run {
            txn.rollback().await.context("discarding the dry run")?;
            writeln!(self.out, "\n{}", style("[WARNING] `--dry-run` prevents the save to database.").yellow())?;
        } else {
            writeln!(self.out, "\n{}", style(" >>>> Saving to database <<<<").cyan())?;
            txn.commit().await.context("saving imported movies")?;
            report.saved = true;
        }

        Ok(report)
    }

    /// `Pending -> ResolvedById | SearchPerformed -> record or failure`.
    async fn resolve(&mut self, token: &str) -> Result<OmdbMovie, FailureReason> {
        match self.source.get_by_imdb_id(token).await {
            Ok(record) => {
                debug!(query = %token, "resolved as IMDb id");
                return Ok(record);
            },
            Err(err) if err.is_not_found() => {
                debug!(query = %token, "not an IMDb id, searching by title");
            },
            Err(err) => return Err(err.into()),
        }

        let candidates = self.source.search_by_title(token).await?;
        if candidates.is_empty() {
            return Err(FailureReason::NoResults);
        }

        let choice = self
            .picker
            .pick(token, &candidates)
            .map_err(|e| FailureReason::Prompt(e.to_string()))?;
        let Some(candidate) = choice.and_then(|i| candidates.get(i)) else {
            return Err(FailureReason::NoCandidateSelected);
        };

        Ok(self.source.get_by_imdb_id(&candidate.imdb_id).await?)
    }
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut rule = String::from("+");
    for width in &widths {
        rule.push_str(&"-".repeat(width + 2));
        rule.push('+');
    }
    rule.push('\n');

    let mut out = rule.clone();
    out.push_str(&table_line(headers, &widths));
    out.push_str(&rule);
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&table_line(&cells, &widths));
    }
    out.push_str(&rule);
    out
}

fn table_line(cells: &[&str], widths: &[usize]) -> String {
    let mut out = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        out.push_str(&format!(" {cell}{} |", " ".repeat(pad)));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use sea_orm::{ConnectionTrait, Database, EntityTrait, PaginatorTrait};

    use super::*;
    use crate::{
        db,
        omdb::{
            CachedSource,
            testing::{FakeSource, candidate, movie},
        },
    };

    /// Answers prompts from a fixed script; asking past its end is an error.
    struct ScriptedPicker(VecDeque<Option<usize>>);

    impl ScriptedPicker {
        fn new(answers: impl IntoIterator<Item = Option<usize>>) -> Self {
            Self(answers.into_iter().collect())
        }
    }

    impl CandidatePicker for ScriptedPicker {
        fn pick(&mut self, query: &str, _candidates: &[SearchResult]) -> anyhow::Result<Option<usize>> {
            self.0.pop_front().with_context(|| format!("no scripted answer left for {query:?}"))
        }
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn matrix() -> OmdbMovie {
        let mut matrix = movie("tt0133093", "The Matrix", "1999");
        matrix.released = "31 Mar 1999".into();
        matrix
    }

    async fn run(
        source: &dyn MovieSource,
        picker: ScriptedPicker,
        db: &DatabaseConnection,
        input: &[&str],
        dry_run: bool,
    ) -> ImportReport {
        let mut command = ImportCommand::new(source, Box::new(picker), Vec::new());
        command.run(db, &tokens(input), dry_run).await.unwrap()
    }

    #[tokio::test]
    async fn id_and_unknown_title() {
        let db = db::test_db().await;
        let source = CachedSource::new(FakeSource::default().with_movie(matrix()));

        let report = run(
            &source,
            ScriptedPicker::new([]),
            &db,
            &["tt0133093", "nonexistent movie xyz"],
            false,
        )
        .await;

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].query, "tt0133093");
        assert_eq!(report.imported[0].label(), "The Matrix (1999)");

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].query, "nonexistent movie xyz");
        assert!(matches!(report.failed[0].reason, FailureReason::NoResults));
        assert_eq!(report.failed[0].reason.to_string(), "no results");

        assert!(report.saved);
        assert_eq!(movie::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn declining_every_candidate_persists_nothing() {
        let db = db::test_db().await;
        let source = FakeSource::default().with_search(
            "bad title",
            vec![
                candidate("tt1", "Bad Title", "2001"),
                candidate("tt2", "Bad Title II", "2003"),
                candidate("tt3", "Bad Titles", "2010"),
            ],
        );

        let report = run(&source, ScriptedPicker::new([None]), &db, &["bad title"], false).await;

        assert!(report.imported.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].reason, FailureReason::NoCandidateSelected));
        // Only the first id attempt; no lookup for any candidate.
        assert_eq!(source.lookup_count(), 1);
        assert_eq!(movie::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn picked_candidate_is_imported() {
        let db = db::test_db().await;
        let source = FakeSource::default()
            .with_movie(matrix())
            .with_search(
                "the matrix",
                vec![
                    candidate("tt0133093", "The Matrix", "1999"),
                    candidate("tt0234215", "The Matrix Reloaded", "2003"),
                ],
            );

        let report = run(&source, ScriptedPicker::new([Some(0)]), &db, &["the matrix"], false).await;

        assert!(report.failed.is_empty());
        assert_eq!(report.imported[0].query, "the matrix");
        assert_eq!(report.imported[0].title, "The Matrix");
        assert_eq!(movie::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn candidate_missing_on_second_lookup_fails_the_token() {
        let db = db::test_db().await;
        let source = FakeSource::default()
            .with_search("ghost", vec![candidate("tt404", "Ghost", "1990")])
            .with_movie(movie("tt1", "One", "2001"));

        let report = run(&source, ScriptedPicker::new([Some(0)]), &db, &["ghost", "tt1"], false).await;

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(&report.failed[0].reason, FailureReason::Lookup(e) if e.is_not_found()));
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].query, "tt1");
    }

    #[tokio::test]
    async fn dry_run_reports_the_same_and_saves_nothing() {
        let build = || {
            FakeSource::default()
                .with_movie(matrix())
                .with_movie(movie("tt2", "Two", "2002"))
                .with_search("two", vec![candidate("tt2", "Two", "2002")])
        };
        let input = ["tt0133093", "two", "nothing at all"];

        let real_db = db::test_db().await;
        let real = run(&build(), ScriptedPicker::new([Some(0)]), &real_db, &input, false).await;

        let dry_db = db::test_db().await;
        let dry = run(&build(), ScriptedPicker::new([Some(0)]), &dry_db, &input, true).await;

        assert_eq!(dry.imported, real.imported);
        let reasons = |r: &ImportReport| {
            r.failed.iter().map(|f| (f.query.clone(), f.reason.to_string())).collect::<Vec<_>>()
        };
        assert_eq!(reasons(&dry), reasons(&real));

        assert!(!dry.saved);
        assert_eq!(movie::Entity::find().count(&dry_db).await.unwrap(), 0);
        assert_eq!(movie::Entity::find().count(&real_db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn broken_lookup_is_isolated_and_not_searched() {
        let db = db::test_db().await;
        let source = FakeSource::default().with_broken("tt500").with_movie(movie("tt1", "One", "2001"));

        let report = run(&source, ScriptedPicker::new([]), &db, &["tt500", "tt1"], false).await;

        assert!(matches!(report.failed[0].reason, FailureReason::Lookup(LookupError::Malformed { .. })));
        assert_eq!(source.search_count(), 0);
        assert_eq!(report.imported.len(), 1);
    }

    #[tokio::test]
    async fn same_id_twice_is_fetched_once_and_conflicts() {
        let db = db::test_db().await;
        let source = CachedSource::new(FakeSource::default().with_movie(movie("tt1", "One", "2001")));

        let report = run(&source, ScriptedPicker::new([]), &db, &["tt1", "tt1"], false).await;

        assert_eq!(source.inner().lookup_count(), 1);
        assert_eq!(report.imported.len(), 1);
        assert!(matches!(report.failed[0].reason, FailureReason::Import(ImportError::Conflict { .. })));
    }

    #[tokio::test]
    async fn prompt_failure_is_a_token_failure() {
        let db = db::test_db().await;
        let source = FakeSource::default().with_search("x", vec![candidate("tt1", "X", "2000")]);

        let report = run(&source, ScriptedPicker::new([]), &db, &["x"], false).await;

        assert!(matches!(report.failed[0].reason, FailureReason::Prompt(_)));
    }

    #[tokio::test]
    async fn candidates_are_listed_only_by_the_picker() {
        let db = db::test_db().await;
        let source = FakeSource::default()
            .with_movie(movie("tt2", "Two", "2002"))
            .with_search("two", vec![candidate("tt2", "Two", "2002"), candidate("tt3", "Two Again", "2004")]);

        let mut out = Vec::new();
        let mut command = ImportCommand::new(&source, Box::new(ScriptedPicker::new([Some(0)])), &mut out);
        command.run(&db, &tokens(&["two"]), true).await.unwrap();
        drop(command);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("two"));
        assert!(!text.contains("Two Again"));
    }

    /// Writes through a separate connection while the operator is being asked,
    /// the way a login on the web server would.
    struct WritingPicker {
        other: DatabaseConnection,
        writes: Arc<Mutex<Vec<Result<(), String>>>>,
    }

    impl CandidatePicker for WritingPicker {
        fn pick(&mut self, _query: &str, _candidates: &[SearchResult]) -> anyhow::Result<Option<usize>> {
            let other = self.other.clone();
            let result = tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    other
                        .execute_unprepared("UPDATE genre SET name = name")
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
            });
            self.writes.lock().unwrap().push(result);
            Ok(Some(0))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn prompts_run_without_holding_the_write_lock() {
        let path = std::env::temp_dir().join(format!("cinematheque-prompt-lock-{}.db", std::process::id()));
        let cleanup = || {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
            }
        };
        cleanup();

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = db::connect_and_migrate(&url).await.unwrap();
        let other = Database::connect(&url).await.unwrap();
        let writes = Arc::new(Mutex::new(Vec::new()));

        // "tt1" is imported before "two" needs a prompt.
        let source = FakeSource::default()
            .with_movie(movie("tt1", "One", "2001"))
            .with_movie(movie("tt2", "Two", "2002"))
            .with_search("two", vec![candidate("tt2", "Two", "2002")]);
        let picker = WritingPicker { other: other.clone(), writes: writes.clone() };

        let mut command = ImportCommand::new(&source, Box::new(picker), Vec::new());
        let report = command.run(&db, &tokens(&["tt1", "two"]), false).await.unwrap();

        assert_eq!(report.imported.len(), 2);
        assert_eq!(*writes.lock().unwrap(), vec![Ok(())]);

        db.close().await.unwrap();
        other.close().await.unwrap();
        cleanup();
    }

    #[test]
    fn renders_both_tables() {
        let report = ImportReport {
            imported: vec![ImportedRow {
                query: "tt0133093".into(),
                id: 1,
                title: "The Matrix".into(),
                year: Some(1999),
            }],
            failed: vec![FailedRow { query: "nonexistent movie xyz".into(), reason: FailureReason::NoResults }],
            saved: true,
        };
        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("| 1  | The Matrix (1999) | tt0133093 |"));
        assert!(text.contains("| nonexistent movie xyz | no results |"));
    }

    #[test]
    fn empty_tables_are_skipped() {
        let mut out = Vec::new();
        ImportReport::default().render(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
