pub mod builder;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use conefor_common::{CancellationToken, Event, EventBus, InfoSection, Outcome};
use crossbeam_channel::Receiver;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub use builder::ParametersBuilder;

use crate::{
    crs::{Crs, MeasurementFrame},
    error::{ProcessError, Result},
    io::{text, vector},
    progress::{Progress, QueryBudget},
    query::{NodeIds, QueryContext, area, attribute, centroid, edge},
    traits::{FeatureSource, TextRecord},
    types::{ConnectionMethod, DistanceRecord, OutputFile, OutputKind},
};

/// Share of a layer's progress given to the attribute query when other
/// queries run too
const ATTRIBUTE_SHARE: f64 = 0.1;

/// File stems of the outputs to produce; unset targets skip their query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputTargets {
    /// Node file with the attribute field (or polygon area) as weight
    #[serde(default)]
    pub attribute_file: Option<String>,
    /// Node file with polygon areas as weight
    #[serde(default)]
    pub area_file: Option<String>,
    /// Connection file with centroid distances
    #[serde(default)]
    pub centroid_file: Option<String>,
    /// Connection file with edge distances
    #[serde(default)]
    pub edge_file: Option<String>,
    /// Line layer drawing centroid links
    #[serde(default)]
    pub centroid_vector: Option<String>,
    /// Line layer drawing edge links
    #[serde(default)]
    pub edge_vector: Option<String>,
}

impl OutputTargets {
    pub fn is_empty(&self) -> bool {
        self.attribute_file.is_none()
            && self.area_file.is_none()
            && self.centroid_file.is_none()
            && self.edge_file.is_none()
            && self.centroid_vector.is_none()
            && self.edge_vector.is_none()
    }
}

/// What to compute for one layer
#[derive(Clone)]
pub struct LayerProcessingParameters {
    pub layer: Arc<dyn FeatureSource>,
    pub id_field: Option<String>,
    pub attribute_field: Option<String>,
    pub connection_method: ConnectionMethod,
    pub distance_threshold: Option<f64>,
    pub targets: OutputTargets,
}

impl LayerProcessingParameters {
    pub fn builder(layer: Arc<dyn FeatureSource>) -> ParametersBuilder {
        ParametersBuilder::new(layer)
    }

    pub fn validate(&self) -> Result<()> {
        let layer = self.layer.as_ref();
        let invalid = |reason: &str| {
            Err(ProcessError::InvalidParameters(format!(
                "layer '{}': {}",
                layer.name(),
                reason
            )))
        };

        if self.targets.is_empty() {
            return invalid("no output requested");
        }

        let needs_area = self.targets.area_file.is_some()
            || (self.targets.attribute_file.is_some() && self.attribute_field.is_none());
        if needs_area && layer.is_point_type() {
            return invalid("point layers need an attribute field, they have no area");
        }

        if let Some(threshold) = self.distance_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return invalid("distance threshold must be a non-negative number");
            }
        }

        for field in [&self.id_field, &self.attribute_field].into_iter().flatten() {
            if !layer.has_field(field) {
                return Err(ProcessError::InvalidAttribute {
                    field: field.clone(),
                    layer: layer.name().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Queries to run, in order
    fn stages(&self) -> Vec<Stage> {
        let targets = &self.targets;
        let mut stages = Vec::new();

        if let Some(stem) = &targets.attribute_file {
            stages.push(match &self.attribute_field {
                Some(field) => Stage::Attribute {
                    field: field.clone(),
                    stem: stem.clone(),
                },
                None => Stage::Area {
                    stem: stem.clone(),
                    kind: OutputKind::NodeAttribute,
                },
            });
        }
        if let Some(stem) = &targets.area_file {
            stages.push(Stage::Area {
                stem: stem.clone(),
                kind: OutputKind::NodeArea,
            });
        }
        if targets.centroid_file.is_some() || targets.centroid_vector.is_some() {
            stages.push(Stage::Centroid);
        }
        if targets.edge_file.is_some() || targets.edge_vector.is_some() {
            stages.push(Stage::Edge);
        }

        stages
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Attribute { field: String, stem: String },
    Area { stem: String, kind: OutputKind },
    Centroid,
    Edge,
}

/// Split a layer's progress share between its queries
fn allocate(stages: &[Stage], share: f64) -> Vec<QueryBudget> {
    let count = stages.len();
    if count == 0 {
        return Vec::new();
    }

    let has_attribute = stages.iter().any(|s| matches!(s, Stage::Attribute { .. }));
    if count > 1 && has_attribute {
        let rest = share * (1.0 - ATTRIBUTE_SHARE) / (count - 1) as f64;
        stages
            .iter()
            .map(|stage| match stage {
                Stage::Attribute { .. } => QueryBudget::split(share * ATTRIBUTE_SHARE),
                _ => QueryBudget::split(rest),
            })
            .collect()
    } else {
        vec![QueryBudget::split(share / count as f64); count]
    }
}

fn within_threshold(records: Vec<DistanceRecord>, threshold: Option<f64>) -> Vec<DistanceRecord> {
    match threshold {
        Some(limit) => records.into_iter().filter(|r| r.distance <= limit).collect(),
        None => records,
    }
}

/// Result of a run: the files written, even when the run failed part way
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub files: Vec<OutputFile>,
    pub outcome: Outcome,
}

impl RunReport {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Runs the queries for a set of layers and writes their outputs.
///
/// A run is all or nothing from the caller's point of view: the first
/// domain error stops every remaining layer. Files written before that stay
/// on disk and are listed in the report.
pub struct Processor {
    output_dir: PathBuf,
    project_crs: Option<Crs>,
    use_selected: bool,
    bus: EventBus,
    cancel: CancellationToken,
}

impl Processor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            project_crs: None,
            use_selected: false,
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Restrict processing to selected features where a selection exists
    pub fn use_selected(mut self, use_selected: bool) -> Self {
        self.use_selected = use_selected;
        self
    }

    /// CRS distances are measured in; defaults to each layer's own CRS
    pub fn project_crs(mut self, crs: Crs) -> Self {
        self.project_crs = Some(crs);
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process every layer on the calling thread
    pub fn run(&self, layers: &[LayerProcessingParameters]) -> RunReport {
        let mut progress = Progress::new(self.bus.clone());
        let mut files = Vec::new();
        progress.reset();

        let result = self.run_layers(layers, &mut progress, &mut files);

        let outcome = match result {
            Ok(()) => {
                let message = format!("Finished, {} file(s) created", files.len());
                info!("{}", message);
                progress.advance(100.0);
                self.bus.info(message, InfoSection::Run);
                Outcome::Success {
                    files: files.iter().map(|f: &OutputFile| f.path.clone()).collect(),
                }
            }
            Err(ProcessError::Cancelled) => {
                warn!("Processing cancelled");
                self.bus.info("Processing cancelled", InfoSection::Run);
                Outcome::Cancelled
            }
            Err(e) => {
                let message = if e.is_fatal_input() {
                    format!("Invalid input, run aborted: {}", e)
                } else {
                    format!("Processing failed: {}", e)
                };
                error!("{}", message);
                self.bus.info(message.clone(), InfoSection::Error);
                Outcome::Failure { message }
            }
        };

        progress.reset();
        self.bus.finish(outcome.clone());
        RunReport { files, outcome }
    }

    /// Process on a background worker; events keep flowing to subscribers
    pub fn spawn(self, layers: Vec<LayerProcessingParameters>) -> JoinHandle<RunReport> {
        thread::spawn(move || self.run(&layers))
    }

    fn run_layers(
        &self,
        layers: &[LayerProcessingParameters],
        progress: &mut Progress,
        files: &mut Vec<OutputFile>,
    ) -> Result<()> {
        for params in layers {
            params.validate()?;
        }

        self.bus.info(
            format!("Processing {} layer(s) into {}", layers.len(), self.output_dir.display()),
            InfoSection::Run,
        );

        let share = if layers.is_empty() {
            0.0
        } else {
            100.0 / layers.len() as f64
        };
        for params in layers {
            self.process_layer(params, share, progress, files)?;
        }
        Ok(())
    }

    fn process_layer(
        &self,
        params: &LayerProcessingParameters,
        share: f64,
        progress: &mut Progress,
        files: &mut Vec<OutputFile>,
    ) -> Result<()> {
        let layer = params.layer.as_ref();
        let project_crs = self.project_crs.clone().unwrap_or_else(|| layer.crs().clone());
        let frame = MeasurementFrame::resolve(layer.crs(), &project_crs)?;

        info!("Processing layer '{}'", layer.name());
        self.bus.info(format!("Processing layer '{}'", layer.name()), InfoSection::Layer);

        let ids = NodeIds::from_field(params.id_field.as_deref());
        let stages = params.stages();
        let budgets = allocate(&stages, share);
        let targets = &params.targets;

        let mut ctx = QueryContext {
            layer,
            frame: &frame,
            use_selected: self.use_selected,
            progress,
            cancel: &self.cancel,
        };

        for (stage, budget) in stages.into_iter().zip(budgets) {
            match stage {
                Stage::Attribute { field, stem } => {
                    let records = attribute::run(&mut ctx, &ids, &field, budget)?;
                    files.push(self.save_text(&mut ctx, &records, &stem, OutputKind::NodeAttribute, budget.save)?);
                }
                Stage::Area { stem, kind } => {
                    let records = area::run(&mut ctx, &ids, budget)?;
                    files.push(self.save_text(&mut ctx, &records, &stem, kind, budget.save)?);
                }
                Stage::Centroid => {
                    let records = centroid::run(&mut ctx, &ids, budget)?;
                    let records = within_threshold(records, params.distance_threshold);
                    self.save_links(
                        &mut ctx,
                        &records,
                        (targets.centroid_file.as_deref(), OutputKind::ConnectionsCentroid),
                        (targets.centroid_vector.as_deref(), OutputKind::VectorCentroidLines),
                        budget.save,
                        files,
                    )?;
                }
                Stage::Edge => {
                    let records = if targets.edge_vector.is_some() {
                        edge::run(&mut ctx, &ids, budget)?
                    } else {
                        edge::run_fast(&mut ctx, &ids, budget)?
                    };
                    let records = within_threshold(records, params.distance_threshold);
                    self.save_links(
                        &mut ctx,
                        &records,
                        (targets.edge_file.as_deref(), OutputKind::ConnectionsEdge),
                        (targets.edge_vector.as_deref(), OutputKind::VectorEdgeLines),
                        budget.save,
                        files,
                    )?;
                }
            }
        }

        info!("Layer '{}' done", layer.name());
        Ok(())
    }

    fn save_text<R: TextRecord>(
        &self,
        ctx: &mut QueryContext,
        records: &[R],
        stem: &str,
        kind: OutputKind,
        save: f64,
    ) -> Result<OutputFile> {
        // Never start a write after a stop request
        ctx.check_cancelled()?;
        let path = text::write(records, &self.output_dir, stem, ctx.layer.encoding())?;
        ctx.advance(save);
        self.announce(&path, kind);
        Ok(OutputFile {
            path,
            kind,
            layer: ctx.layer.name().to_string(),
        })
    }

    fn save_links(
        &self,
        ctx: &mut QueryContext,
        records: &[DistanceRecord],
        text_target: (Option<&str>, OutputKind),
        vector_target: (Option<&str>, OutputKind),
        save: f64,
        files: &mut Vec<OutputFile>,
    ) -> Result<()> {
        let writes = [text_target.0, vector_target.0].iter().flatten().count().max(1);
        let share = save / writes as f64;

        if let (Some(stem), kind) = text_target {
            files.push(self.save_text(ctx, records, stem, kind, share)?);
        }
        if let (Some(stem), kind) = vector_target {
            ctx.check_cancelled()?;
            let path = vector::write(records, ctx.layer.crs(), &self.output_dir, stem)?;
            ctx.advance(share);
            self.announce(&path, kind);
            files.push(OutputFile {
                path,
                kind,
                layer: ctx.layer.name().to_string(),
            });
        }
        Ok(())
    }

    fn announce(&self, path: &Path, kind: OutputKind) {
        info!("Created {} file {}", kind, path.display());
        self.bus
            .info(format!("Created {}", path.display()), InfoSection::Layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::{layer_with, square};
    use crate::source::{AttributeValue, FieldType, GeometryKind, MemoryLayer};
    use geo_types::{Geometry, point, polygon};
    use std::fs;

    fn three_points() -> Arc<dyn FeatureSource> {
        Arc::new(layer_with(
            GeometryKind::Point,
            vec![
                (1, point!(x: 0.0, y: 0.0).into()),
                (2, point!(x: 3.0, y: 4.0).into()),
                (3, point!(x: 0.0, y: 8.0).into()),
            ],
        ))
    }

    fn invalid_polygons() -> Arc<dyn FeatureSource> {
        let bow_tie: Geometry<f64> = polygon![
            (x: 10.0, y: 0.0),
            (x: 12.0, y: 2.0),
            (x: 12.0, y: 0.0),
            (x: 10.0, y: 2.0),
        ]
        .into();
        Arc::new(layer_with(
            GeometryKind::Polygon,
            vec![
                (1, square(0.0, 0.0, 1.0).into()),
                (2, square(4.0, 0.0, 1.0).into()),
                (3, bow_tie),
            ],
        ))
    }

    #[test]
    fn test_three_points_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let params = LayerProcessingParameters::builder(three_points())
            .id_field("id")
            .connection_file("distances")
            .build()
            .unwrap();

        let processor = Processor::new(dir.path());
        let events = processor.subscribe();
        let report = processor.run(&[params]);

        assert!(report.outcome.is_success());
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].kind, OutputKind::ConnectionsCentroid);
        assert_eq!(report.files[0].layer, "test");
        assert_eq!(
            fs::read_to_string(&report.files[0].path).unwrap(),
            "1\t2\t5.0\n1\t3\t8.0\n2\t3\t5.0\n\n"
        );

        let events: Vec<Event> = events.try_iter().collect();
        assert_eq!(events.first(), Some(&Event::Progress(0)));
        assert!(events.contains(&Event::Progress(100)));
        assert!(matches!(events.last(), Some(Event::Finished(Outcome::Success { .. }))));
    }

    #[test]
    fn test_invalid_feature_aborts_run_but_keeps_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = LayerProcessingParameters::builder(three_points())
            .id_field("id")
            .connection_file("points")
            .build()
            .unwrap();
        let second = LayerProcessingParameters::builder(invalid_polygons())
            .id_field("id")
            .connection_method(ConnectionMethod::EdgeDistance)
            .connection_file("patches")
            .build()
            .unwrap();

        let processor = Processor::new(dir.path());
        let events = processor.subscribe();
        let report = processor.run(&[first, second]);

        assert!(matches!(report.outcome, Outcome::Failure { .. }));
        assert_eq!(report.files.len(), 1);
        assert!(dir.path().join("points.txt").exists());
        assert!(!dir.path().join("patches.txt").exists());

        let events: Vec<Event> = events.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Info { section: InfoSection::Error, message } if message.contains("id 3")
        )));
        // Progress is back at zero before the terminal event
        assert_eq!(events[events.len() - 2], Event::Progress(0));
    }

    #[test]
    fn test_negative_attribute_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = MemoryLayer::new("nodes", GeometryKind::Point, Crs::planar("local"))
            .with_field("id", FieldType::Integer)
            .with_field("quality", FieldType::Real);
        for (id, quality) in [(1, 3.0), (2, -5.0)] {
            layer.push_feature(
                Some(point!(x: id as f64, y: 0.0).into()),
                [("id", AttributeValue::Integer(id)), ("quality", AttributeValue::Real(quality))],
            );
        }
        let params = LayerProcessingParameters::builder(Arc::new(layer))
            .id_field("id")
            .attribute_field("quality")
            .attribute_file("nodes")
            .build()
            .unwrap();

        let report = Processor::new(dir.path()).run(&[params]);
        match &report.outcome {
            Outcome::Failure { message } => {
                assert!(message.starts_with("Invalid input"), "{}", message);
                assert!(message.contains("negative"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(report.files.is_empty());
        assert!(!dir.path().join("nodes.txt").exists());
    }

    #[test]
    fn test_io_failure_is_not_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("out");
        fs::write(&blocked, "not a directory").unwrap();

        let params = LayerProcessingParameters::builder(three_points())
            .id_field("id")
            .connection_file("distances")
            .build()
            .unwrap();

        let report = Processor::new(&blocked).run(&[params]);
        match &report.outcome {
            Outcome::Failure { message } => {
                assert!(message.starts_with("Processing failed"), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_attribute_file_falls_back_to_area() {
        let dir = tempfile::tempdir().unwrap();
        let layer = Arc::new(layer_with(
            GeometryKind::Polygon,
            vec![(1, square(0.0, 0.0, 2.0).into()), (2, square(5.0, 0.0, 3.0).into())],
        ));
        let params = LayerProcessingParameters::builder(layer)
            .id_field("id")
            .attribute_file("nodes")
            .connection_method(ConnectionMethod::EdgeDistance)
            .connection_file("edges")
            .vector_file("edge_lines")
            .build()
            .unwrap();

        let report = Processor::new(dir.path()).run(&[params]);
        assert!(report.outcome.is_success());

        let kinds: Vec<OutputKind> = report.files.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![OutputKind::NodeAttribute, OutputKind::ConnectionsEdge, OutputKind::VectorEdgeLines]
        );
        assert_eq!(fs::read_to_string(&report.files[0].path).unwrap(), "1\t4.0\n2\t9.0\n\n");
        assert_eq!(fs::read_to_string(&report.files[1].path).unwrap(), "1\t2\t3.0\n\n");
    }

    #[test]
    fn test_threshold_filters_links() {
        let dir = tempfile::tempdir().unwrap();
        let params = LayerProcessingParameters::builder(three_points())
            .id_field("id")
            .distance_threshold(6.0)
            .connection_file("near")
            .vector_file("near_lines")
            .build()
            .unwrap();

        let report = Processor::new(dir.path()).run(&[params]);
        assert_eq!(report.files.len(), 2);
        assert_eq!(
            fs::read_to_string(&report.files[0].path).unwrap(),
            "1\t2\t5.0\n2\t3\t5.0\n\n"
        );
        assert_eq!(report.files[1].kind, OutputKind::VectorCentroidLines);
    }

    #[test]
    fn test_reruns_create_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let params = LayerProcessingParameters::builder(three_points())
            .connection_file("links")
            .build()
            .unwrap();
        let processor = Processor::new(dir.path());

        let first = processor.run(&[params.clone()]);
        let second = processor.run(&[params]);
        assert_eq!(first.files[0].path, dir.path().join("links.txt"));
        assert_eq!(second.files[0].path, dir.path().join("links_1.txt"));
    }

    #[test]
    fn test_validation() {
        let points = three_points();
        let no_targets = LayerProcessingParameters::builder(points.clone()).build();
        assert!(matches!(no_targets, Err(ProcessError::InvalidParameters(_))));

        let area_of_points = LayerProcessingParameters::builder(points.clone())
            .attribute_file("nodes")
            .build();
        assert!(matches!(area_of_points, Err(ProcessError::InvalidParameters(_))));

        let unknown_field = LayerProcessingParameters::builder(points.clone())
            .id_field("code")
            .connection_file("links")
            .build();
        assert!(matches!(unknown_field, Err(ProcessError::InvalidAttribute { .. })));

        let negative = LayerProcessingParameters::builder(points)
            .distance_threshold(-1.0)
            .connection_file("links")
            .build();
        assert!(matches!(negative, Err(ProcessError::InvalidParameters(_))));
    }

    #[test]
    fn test_budgets() {
        let attribute = Stage::Attribute {
            field: "q".to_string(),
            stem: "n".to_string(),
        };
        let budgets = allocate(&[attribute.clone(), Stage::Centroid, Stage::Edge], 50.0);
        assert!((budgets[0].total() - 5.0).abs() < 1e-9);
        assert!((budgets[1].total() - 22.5).abs() < 1e-9);
        assert!((budgets[2].total() - 22.5).abs() < 1e-9);

        let alone = allocate(&[attribute], 50.0);
        assert!((alone[0].total() - 50.0).abs() < 1e-9);

        let even = allocate(&[Stage::Centroid, Stage::Edge], 100.0);
        assert!((even[0].total() - 50.0).abs() < 1e-9);
        assert!(allocate(&[], 100.0).is_empty());
    }

    #[test]
    fn test_cancelled_run_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let params = LayerProcessingParameters::builder(three_points())
            .connection_file("links")
            .build()
            .unwrap();
        let processor = Processor::new(dir.path());
        processor.cancellation_token().cancel();

        let report = processor.run(&[params]);
        assert_eq!(report.outcome, Outcome::Cancelled);
        assert!(report.files.is_empty());
        assert!(!dir.path().join("links.txt").exists());
    }

    #[test]
    fn test_spawned_worker_reports_through_events() {
        let dir = tempfile::tempdir().unwrap();
        let params = LayerProcessingParameters::builder(three_points())
            .connection_file("links")
            .build()
            .unwrap();
        let processor = Processor::new(dir.path());
        let events = processor.subscribe();

        let report = processor.spawn(vec![params]).join().unwrap();
        assert!(report.outcome.is_success());

        let finished = events
            .iter()
            .find_map(|event| match event {
                Event::Finished(outcome) => Some(outcome),
                _ => None,
            })
            .unwrap();
        assert_eq!(finished, Outcome::Success { files: report.paths() });
    }
}
