//! Region orchestration.
//!
//! Each configured region moves through
//! `Pending -> FilesChecked -> Loaded -> Normalized -> Aggregated -> Rendered -> Done`,
//! or ends in `Skipped` when input files are missing or a step fails. A
//! skipped region never stops the batch. Once every region has finished, the
//! cross-region comparison chart and the KPI table are written from the
//! collected results.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, warn};

use crate::analyzers::aggregate::{
    RegionAggregates, aggregate_region, hourly_series, weekday_hour_grid,
};
use crate::analyzers::exceptions::{ExceptionLabel, ExceptionalDays, extract_exceptional_days};
use crate::analyzers::geometry::{RouteLengthPolicy, ShapeLength, ordered_shapes, route_lengths};
use crate::analyzers::time::{StopEvent, normalize_stop_times};
use crate::analyzers::travel_time::{TravelTimeEstimate, estimate_travel_times};
use crate::analyzers::types::{RegionSummary, RouteCount};
use crate::analyzers::utility::ranked_counts;
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::feed::{FeedTables, missing_files};
use crate::output::{
    print_json, print_pretty, write_exceptional_days, write_json, write_records,
};
use crate::render::{
    BarChart, ChartRenderer, Heatmap, LeafletMapRenderer, LineChart, LineSeries, MapRenderer,
    MapView, Marker, Polyline, ROUTE_COLORS, SvgChartRenderer,
};
use crate::stats::RegionKpis;

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Pending,
    FilesChecked,
    Loaded,
    Normalized,
    Aggregated,
    Rendered,
    Done,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingFiles(Vec<String>),
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingFiles(files) => write!(f, "missing files: {}", files.join(", ")),
            SkipReason::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Results of one fully processed region.
#[derive(Debug, Clone)]
pub struct RegionReport {
    pub region: String,
    pub kpis: RegionKpis,
    pub hourly: [usize; 24],
    pub route_lengths: Vec<ShapeLength>,
    pub exceptional_days: usize,
    pub travel_time: Option<TravelTimeEstimate>,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum RegionOutcome {
    Done(Box<RegionReport>),
    Skipped { region: String, reason: SkipReason },
}

impl RegionOutcome {
    pub fn region(&self) -> &str {
        match self {
            RegionOutcome::Done(report) => &report.region,
            RegionOutcome::Skipped { region, .. } => region,
        }
    }

    pub fn state(&self) -> RegionState {
        match self {
            RegionOutcome::Done(_) => RegionState::Done,
            RegionOutcome::Skipped { .. } => RegionState::Skipped,
        }
    }
}

/// Outcome of a whole batch, regions in configuration order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<RegionOutcome>,
    pub comparison_chart: Option<PathBuf>,
    pub kpi_table: Option<PathBuf>,
}

impl BatchReport {
    pub fn done(&self) -> impl Iterator<Item = &RegionReport> {
        self.outcomes.iter().filter_map(|o| match o {
            RegionOutcome::Done(report) => Some(report.as_ref()),
            RegionOutcome::Skipped { .. } => None,
        })
    }

    pub fn done_count(&self) -> usize {
        self.done().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.done_count()
    }
}

/// Tracks and logs a region's progress through its states.
struct RegionRun<'a> {
    region: &'a str,
    state: RegionState,
}

impl<'a> RegionRun<'a> {
    fn new(region: &'a str) -> Self {
        Self {
            region,
            state: RegionState::Pending,
        }
    }

    fn advance(&mut self, next: RegionState) {
        debug!(region = self.region, from = ?self.state, to = ?next, "Region state");
        self.state = next;
    }
}

/// Runs the per-region pipeline and the cross-region post-pass.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ReportConfig>,
    charts: Arc<dyn ChartRenderer>,
    maps: Arc<dyn MapRenderer>,
}

impl Orchestrator {
    pub fn new(
        config: ReportConfig,
        charts: Arc<dyn ChartRenderer>,
        maps: Arc<dyn MapRenderer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            charts,
            maps,
        }
    }

    /// SVG charts and Leaflet maps.
    pub fn with_default_renderers(config: ReportConfig) -> Self {
        let retries = config.write_retries;
        Self::new(
            config,
            Arc::new(SvgChartRenderer::new(retries)),
            Arc::new(LeafletMapRenderer::new(retries)),
        )
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Missing input files per configured region; empty lists mean ready.
    pub fn check(&self) -> Vec<(String, Vec<String>)> {
        self.config
            .regions
            .iter()
            .map(|r| (r.clone(), missing_files(&self.config.region_input_dir(r))))
            .collect()
    }

    /// Processes every region, at most `concurrency` at a time, then writes
    /// the comparison chart and KPI table.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, when no region could be processed,
    /// or when the shared outputs cannot be written.
    #[tracing::instrument(skip(self), fields(regions = self.config.regions.len(), concurrency = self.config.concurrency))]
    pub async fn run(&self) -> Result<BatchReport> {
        self.config.validate()?;
        std::fs::create_dir_all(&self.config.result_path).with_context(|| {
            format!("Failed to create {}", self.config.result_path.display())
        })?;
        std::fs::create_dir_all(&self.config.viz_path)
            .with_context(|| format!("Failed to create {}", self.config.viz_path.display()))?;

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.concurrency));
        let mut tasks = vec![];

        for region in self.config.regions.clone() {
            let sem = semaphore.clone();
            let this = self.clone();
            let span = tracing::info_span!("process_region", region = %region);

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await;
                    let name = region.clone();
                    let current = tracing::Span::current();
                    match tokio::task::spawn_blocking(move || {
                        current.in_scope(|| this.process_region(&region))
                    })
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(error = %e, "Region task panicked");
                            RegionOutcome::Skipped {
                                region: name,
                                reason: SkipReason::Failed(e.to_string()),
                            }
                        }
                    }
                }
                .instrument(span),
            );
            tasks.push(task);
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (task, region) in tasks.into_iter().zip(&self.config.regions) {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(RegionOutcome::Skipped {
                    region: region.clone(),
                    reason: SkipReason::Failed(e.to_string()),
                }),
            }
        }

        self.finish(outcomes)
    }

    /// Post-pass over all finished regions.
    fn finish(&self, outcomes: Vec<RegionOutcome>) -> Result<BatchReport> {
        let mut report = BatchReport {
            outcomes,
            comparison_chart: None,
            kpi_table: None,
        };

        info!(
            done = report.done_count(),
            skipped = report.skipped_count(),
            "Batch summary"
        );

        if report.done_count() == 0 {
            return Err(ReportError::NoProcessableRegion.into());
        }

        let kpi_path = self.config.result_path.join("kpis.csv");
        let kpis: Vec<&RegionKpis> = report.done().map(|r| &r.kpis).collect();
        write_records(&kpi_path, &kpis, self.config.write_retries)
            .context("Failed to write KPI table")?;

        let chart = LineChart {
            title: "Hourly frequency by region".into(),
            x_label: "Hour of day".into(),
            y_label: "Stop events".into(),
            x_ticks: (0..24).map(|h| h.to_string()).collect(),
            series: report
                .done()
                .map(|r| LineSeries {
                    name: r.region.clone(),
                    values: r.hourly.iter().map(|c| *c as f64).collect(),
                })
                .collect(),
        };
        let comparison_path = self
            .config
            .result_path
            .join(format!("region_comparison.{}", self.charts.extension()));
        self.charts.line_chart(&comparison_path, &chart)?;
        info!(path = %comparison_path.display(), "Comparison chart written");

        report.comparison_chart = Some(comparison_path);
        report.kpi_table = Some(kpi_path);
        Ok(report)
    }

    /// Runs one region end to end. Never fails: problems end in `Skipped`.
    pub fn process_region(&self, region: &str) -> RegionOutcome {
        let mut run = RegionRun::new(region);
        info!(region, "Processing region");

        let input_dir = self.config.region_input_dir(region);
        let missing = missing_files(&input_dir);
        if !missing.is_empty() {
            let err = ReportError::MissingInputFiles {
                region: region.to_string(),
                missing: missing.clone(),
            };
            warn!(region, error = %err, "Skipping region");
            run.advance(RegionState::Skipped);
            return RegionOutcome::Skipped {
                region: region.to_string(),
                reason: SkipReason::MissingFiles(missing),
            };
        }
        run.advance(RegionState::FilesChecked);

        match self.analyze_and_render(&mut run, &input_dir) {
            Ok(report) => {
                run.advance(RegionState::Done);
                info!(region, artifacts = report.artifacts.len(), "Region done");
                RegionOutcome::Done(Box::new(report))
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(region, state = ?run.state, error = %message, "Region failed, skipping");
                run.advance(RegionState::Skipped);
                RegionOutcome::Skipped {
                    region: region.to_string(),
                    reason: SkipReason::Failed(message),
                }
            }
        }
    }

    fn analyze_and_render(&self, run: &mut RegionRun<'_>, input_dir: &Path) -> Result<RegionReport> {
        let region = run.region;
        let config = &self.config;

        let tables = FeedTables::load(input_dir)
            .with_context(|| format!("Failed to load feed for {region}"))?;
        info!(
            region,
            stops = tables.stops.len(),
            stop_times = tables.stop_times.len(),
            trips = tables.trips.len(),
            shapes = tables.shapes.len(),
            "Feed loaded"
        );
        run.advance(RegionState::Loaded);

        let events = normalize_stop_times(&tables.stop_times, config.weekday_anchor);
        run.advance(RegionState::Normalized);

        let agg = aggregate_region(&events, &tables.trips);
        let lengths = route_lengths(&tables.shapes, RouteLengthPolicy::ApproximateRouteLength);
        let exceptions = extract_exceptional_days(&tables.calendar_dates);
        if !exceptions.rejected.is_empty() {
            warn!(region, rejected = exceptions.rejected.len(), "Calendar exceptions rejected");
        }
        let travel = estimate_travel_times(&events, &tables.trips, &tables.shapes, &config.sampling);
        match &travel {
            Some(t) => info!(
                region,
                routes = t.per_route.len(),
                joined = t.joined_events,
                dropped_without_trip = t.dropped_without_trip,
                dropped_without_shape = t.dropped_without_shape,
                "Travel times estimated"
            ),
            None => info!(region, "Travel-time sample empty, no estimate"),
        }

        let kpis = RegionKpis::from_region(region, &tables, &agg);
        print_pretty(&kpis);
        print_json(&kpis)?;
        if kpis.unparsed_stop_events > 0 {
            warn!(
                region,
                unparsed = kpis.unparsed_stop_events,
                pct = kpis.unparsed_pct(),
                "Stop events with unparsable arrival time"
            );
        }
        run.advance(RegionState::Aggregated);

        let artifacts = self.render_region(
            region,
            &tables,
            &events,
            &agg,
            &lengths,
            &exceptions,
            travel.as_ref(),
        )?;
        run.advance(RegionState::Rendered);

        Ok(RegionReport {
            region: region.to_string(),
            kpis,
            hourly: hourly_series(&agg.counts_by_hour),
            route_lengths: lengths,
            exceptional_days: exceptions.days.len(),
            travel_time: travel,
            artifacts,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn render_region(
        &self,
        region: &str,
        tables: &FeedTables,
        events: &[StopEvent],
        agg: &RegionAggregates,
        lengths: &[ShapeLength],
        exceptions: &ExceptionalDays,
        travel: Option<&TravelTimeEstimate>,
    ) -> Result<Vec<PathBuf>> {
        let config = &self.config;
        let result_dir = config.region_result_dir(region);
        let viz_dir = config.region_viz_dir(region);
        std::fs::create_dir_all(&result_dir)
            .with_context(|| format!("Failed to create {}", result_dir.display()))?;
        std::fs::create_dir_all(&viz_dir)
            .with_context(|| format!("Failed to create {}", viz_dir.display()))?;

        let img = |name: &str| result_dir.join(format!("{name}.{}", self.charts.extension()));
        let map = |name: &str| viz_dir.join(format!("{name}.{}", self.maps.extension()));
        let view = MapView {
            center: config.map.center,
            zoom: config.map.zoom,
        };
        let mut artifacts = Vec::new();

        // Hourly frequency
        let path = img("hourly_frequency");
        self.charts.bar_chart(
            &path,
            &BarChart {
                title: format!("Public transport frequency by hour - {region}"),
                x_label: "Hour of day".into(),
                y_label: "Stop events".into(),
                bars: hourly_series(&agg.counts_by_hour)
                    .iter()
                    .enumerate()
                    .map(|(h, c)| (h.to_string(), *c as f64))
                    .collect(),
                colors: vec!["skyblue".into()],
            },
        )?;
        artifacts.push(path);

        // Busiest stops
        let busiest = busiest_stop_markers(tables, agg);
        let path = map("stop_markers");
        self.maps.markers(&path, &view, &busiest)?;
        artifacts.push(path);

        let path = map("stop_density");
        let density: Vec<[f64; 2]> = busiest.iter().map(|m| [m.lat, m.lon]).collect();
        self.maps.density(&path, &view, &density)?;
        artifacts.push(path);

        // Busiest routes
        let path = img("top_routes");
        self.charts.bar_chart(
            &path,
            &BarChart {
                title: format!("Busiest routes - {region}"),
                x_label: "Route".into(),
                y_label: "Trips".into(),
                bars: ranked_counts(&agg.counts_by_route)
                    .into_iter()
                    .map(|(route, trips)| (route, trips as f64))
                    .collect(),
                colors: vec!["orange".into()],
            },
        )?;
        artifacts.push(path);

        // Weekday x hour
        let path = img("weekday_hour_heatmap");
        let grid = weekday_hour_grid(&agg.counts_by_weekday_hour);
        self.charts.heatmap(
            &path,
            &Heatmap {
                title: format!("Frequency by weekday and hour - {region}"),
                x_label: "Hour of day".into(),
                y_label: "Weekday".into(),
                x_ticks: (0..24).map(|h| h.to_string()).collect(),
                y_ticks: WEEKDAY_LABELS.iter().map(|d| d.to_string()).collect(),
                cells: grid
                    .iter()
                    .map(|row| row.iter().map(|c| *c as f64).collect())
                    .collect(),
            },
        )?;
        artifacts.push(path);

        // Route lengths
        let path = img("route_lengths");
        self.charts.bar_chart(
            &path,
            &BarChart {
                title: format!("Route length - {region}"),
                x_label: "Shape".into(),
                y_label: "Total distance (approx.)".into(),
                bars: lengths
                    .iter()
                    .take(config.top_route_lengths)
                    .map(|l| (l.shape_id.clone(), l.length))
                    .collect(),
                colors: vec!["purple".into()],
            },
        )?;
        artifacts.push(path);

        let path = map("route_shapes");
        let lines: Vec<Polyline> = ordered_shapes(&tables.shapes)
            .into_iter()
            .enumerate()
            .map(|(i, (id, line))| Polyline {
                id,
                line,
                color: ROUTE_COLORS[i % ROUTE_COLORS.len()].to_string(),
            })
            .collect();
        self.maps.polylines(&path, &view, &lines)?;
        artifacts.push(path);

        // Exceptional days
        let counts = exceptions.counts_by_label();
        let path = img("exception_days");
        self.charts.bar_chart(
            &path,
            &BarChart {
                title: format!("Exceptional service days - {region}"),
                x_label: "Exception type".into(),
                y_label: "Days affected".into(),
                bars: [ExceptionLabel::Added, ExceptionLabel::Removed]
                    .iter()
                    .map(|l| (l.to_string(), counts.get(l).copied().unwrap_or(0) as f64))
                    .collect(),
                colors: vec!["green".into(), "red".into()],
            },
        )?;
        artifacts.push(path);

        let path = result_dir.join("exceptional_days.csv");
        write_exceptional_days(&path, &exceptions.days, config.write_retries)?;
        artifacts.push(path);

        // Travel time
        if let Some(travel) = travel {
            let path = img("average_travel_time");
            self.charts.bar_chart(
                &path,
                &BarChart {
                    title: format!("Average travel time by route - {region}"),
                    x_label: "Route".into(),
                    y_label: "Average travel time (minutes)".into(),
                    bars: travel
                        .per_route
                        .iter()
                        .map(|r| (r.route_id.clone(), r.mean_minutes))
                        .collect(),
                    colors: vec!["skyblue".into()],
                },
            )?;
            artifacts.push(path);
        }

        let summary = RegionSummary {
            schema_version: 1,
            region: region.to_string(),
            generated_at: chrono::Utc::now(),
            peak_hour: agg.peak_hour,
            counts_by_hour: hourly_series(&agg.counts_by_hour).to_vec(),
            top_routes: ranked_counts(&agg.counts_by_route)
                .into_iter()
                .map(|(route_id, trips)| RouteCount { route_id, trips })
                .collect(),
            longest_shapes: lengths.iter().take(config.top_route_lengths).cloned().collect(),
            exception_counts: counts.iter().map(|(l, c)| (l.to_string(), *c)).collect(),
            rejected_exceptions: exceptions.rejected.clone(),
            travel_time: travel.cloned(),
        };
        let path = result_dir.join("summary.json");
        write_json(&path, &summary, config.write_retries)?;
        artifacts.push(path);

        debug!(region, events = events.len(), artifacts = artifacts.len(), "Region rendered");
        Ok(artifacts)
    }
}

/// Markers for every stop that has at least one stop event.
fn busiest_stop_markers(tables: &FeedTables, agg: &RegionAggregates) -> Vec<Marker> {
    tables
        .stops
        .iter()
        .filter_map(|stop| {
            let count = agg.counts_by_stop.get(&stop.stop_id)?;
            let (lat, lon) = (stop.stop_lat?, stop.stop_lon?);
            let name = stop.stop_name.as_deref().unwrap_or(&stop.stop_id);
            Some(Marker {
                lat,
                lon,
                popup: format!("Station: {name}\nFrequency: {count}"),
            })
        })
        .collect()
}
