//! City → coordinates → forecast resolution.
//!
//! [`PipelineMachine`] is the synchronous state machine. Every submitted query
//! bumps a generation counter and hands out a ticket; a result is only applied
//! when its ticket belongs to the latest generation, so a slow lookup for an
//! old query can never overwrite a newer one.
//!
//! [`ResolutionPipeline`] drives the machine with real (async) lookups and
//! publishes a [`PipelineSnapshot`] after every applied transition.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    error::LookupError,
    model::{CityQuery, Coordinate, EmptyQuery, ForecastData},
    provider::{ForecastFetcher, GeocodingResolver},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    ResolvingCity,
    ResolvingForecast,
    Ready(ForecastData),
    Error(LookupError),
}

impl PipelineState {
    /// No lookup in flight.
    pub fn is_at_rest(&self) -> bool {
        matches!(self, Self::Idle | Self::Ready(_) | Self::Error(_))
    }

    pub fn is_loading(&self) -> bool {
        !self.is_at_rest()
    }

    pub fn forecast(&self) -> Option<&ForecastData> {
        match self {
            Self::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Everything a view needs to know about the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub coordinate: Coordinate,
    pub query: Option<CityQuery>,
}

/// Issued by [`PipelineMachine::submit`]; redeem with the geocoding result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeTicket {
    generation: u64,
    pub query: CityQuery,
}

/// Issued once a coordinate is known; redeem with the forecast result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastTicket {
    generation: u64,
    pub coordinate: Coordinate,
}

#[derive(Debug, Default)]
pub struct PipelineMachine {
    snapshot: PipelineSnapshot,
    generation: u64,
}

impl PipelineMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &PipelineSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> &PipelineState {
        &self.snapshot.state
    }

    pub fn coordinate(&self) -> Coordinate {
        self.snapshot.coordinate
    }

    /// Start a new run. Valid from any state: an in-flight run is superseded.
    pub fn submit(&mut self, raw: &str) -> Result<GeocodeTicket, EmptyQuery> {
        let query = CityQuery::parse(raw)?;

        self.generation += 1;
        self.snapshot.query = Some(query.clone());
        self.snapshot.state = PipelineState::ResolvingCity;
        tracing::info!(city = %query, generation = self.generation, "Resolving city");

        Ok(GeocodeTicket { generation: self.generation, query })
    }

    /// Apply a geocoding result. Returns the forecast ticket to fetch with,
    /// or `None` if the run failed or was superseded.
    pub fn geocode_finished(
        &mut self,
        ticket: &GeocodeTicket,
        result: Result<Coordinate, LookupError>,
    ) -> Option<ForecastTicket> {
        if self.is_stale(ticket.generation, "geocode") {
            return None;
        }

        match result {
            Ok(coordinate) => {
                self.snapshot.coordinate = coordinate;
                self.snapshot.state = PipelineState::ResolvingForecast;
                tracing::info!(city = %ticket.query, %coordinate, "Resolving forecast");
                Some(ForecastTicket { generation: ticket.generation, coordinate })
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Apply a forecast result. Returns whether it was committed.
    pub fn forecast_finished(
        &mut self,
        ticket: ForecastTicket,
        result: Result<ForecastData, LookupError>,
    ) -> bool {
        if self.is_stale(ticket.generation, "forecast") {
            return false;
        }

        match result {
            Ok(data) => {
                tracing::info!(coordinate = %ticket.coordinate, days = data.daily.len(), "Forecast ready");
                self.snapshot.state = PipelineState::Ready(data);
            }
            Err(err) => self.fail(err),
        }
        true
    }

    fn is_stale(&self, generation: u64, stage: &str) -> bool {
        let stale = generation != self.generation;
        if stale {
            tracing::debug!(
                stage,
                generation,
                latest = self.generation,
                "Discarding result of superseded query"
            );
        }
        stale
    }

    // Replacing the state drops any previous forecast with it.
    fn fail(&mut self, err: LookupError) {
        tracing::warn!(error = %err, detail = err.detail().unwrap_or(""), "Lookup failed");
        self.snapshot.state = PipelineState::Error(err);
    }
}

/// Runs the geocode → forecast chain and owns the shared machine.
#[derive(Debug)]
pub struct ResolutionPipeline<G, F> {
    geocoder: G,
    fetcher: F,
    machine: Mutex<PipelineMachine>,
    updates: watch::Sender<PipelineSnapshot>,
}

impl<G, F> ResolutionPipeline<G, F>
where
    G: GeocodingResolver,
    F: ForecastFetcher,
{
    pub fn new(geocoder: G, fetcher: F) -> Self {
        let (updates, _) = watch::channel(PipelineSnapshot::default());
        Self { geocoder, fetcher, machine: Mutex::new(PipelineMachine::new()), updates }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.machine.lock().snapshot().clone()
    }

    /// Receive a fresh snapshot after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.updates.subscribe()
    }

    /// Run one full lookup for `raw`. Several searches may overlap; only the
    /// most recently submitted one can change the state.
    pub async fn search(&self, raw: &str) -> Result<PipelineSnapshot, EmptyQuery> {
        let ticket = self.apply(|m| m.submit(raw))?;

        let located = self.geocoder.resolve(&ticket.query).await;
        let Some(forecast_ticket) = self.apply(|m| m.geocode_finished(&ticket, located)) else {
            return Ok(self.snapshot());
        };

        let forecast = self.fetcher.fetch(forecast_ticket.coordinate).await;
        self.apply(|m| m.forecast_finished(forecast_ticket, forecast));

        Ok(self.snapshot())
    }

    /// Like [`search`](Self::search), calling `on_change` with each snapshot
    /// published while the lookup runs, loading states included.
    pub async fn search_observed(
        &self,
        raw: &str,
        mut on_change: impl FnMut(&PipelineSnapshot),
    ) -> Result<PipelineSnapshot, EmptyQuery> {
        let mut updates = self.subscribe();
        let search = self.search(raw);
        tokio::pin!(search);

        loop {
            tokio::select! {
                // Report pending changes before the final result.
                biased;
                Ok(()) = updates.changed() => {
                    let snapshot = updates.borrow_and_update().clone();
                    on_change(&snapshot);
                }
                done = &mut search => return done,
            }
        }
    }

    // The lock is released before returning, never held across an await.
    fn apply<T>(&self, step: impl FnOnce(&mut PipelineMachine) -> T) -> T {
        let mut machine = self.machine.lock();
        let before = machine.snapshot().clone();
        let out = step(&mut machine);
        if *machine.snapshot() != before {
            self.updates.send_replace(machine.snapshot().clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentConditions, DailyForecast};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::{mpsc, oneshot};

    fn forecast(temp: f64, code: i32) -> ForecastData {
        ForecastData {
            current: CurrentConditions { temperature: temp, weather_code: code },
            daily: vec![DailyForecast {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                temp_max: temp + 3.0,
                temp_min: temp - 3.0,
                weather_code: code,
            }],
        }
    }

    const LONDON: Coordinate = Coordinate::new(51.5072, -0.1276);
    const PARIS: Coordinate = Coordinate::new(48.8566, 2.3522);

    // ---- machine ----

    #[test]
    fn starts_idle_at_fallback() {
        let m = PipelineMachine::new();
        assert_eq!(*m.state(), PipelineState::Idle);
        assert_eq!(m.coordinate(), Coordinate::FALLBACK);
        assert!(m.snapshot().query.is_none());
    }

    #[test]
    fn submit_moves_to_resolving_city_from_any_rest_state() {
        let mut m = PipelineMachine::new();
        m.submit("London").unwrap();
        assert_eq!(*m.state(), PipelineState::ResolvingCity);

        // Ready -> ResolvingCity
        let t = m.submit("London").unwrap();
        let ft = m.geocode_finished(&t, Ok(LONDON)).unwrap();
        assert!(m.forecast_finished(ft, Ok(forecast(10.0, 0))));
        assert!(matches!(m.state(), PipelineState::Ready(_)));
        m.submit("Paris").unwrap();
        assert_eq!(*m.state(), PipelineState::ResolvingCity);

        // Error -> ResolvingCity
        let t = m.submit("Atlantis").unwrap();
        m.geocode_finished(&t, Err(LookupError::NotFound));
        assert!(matches!(m.state(), PipelineState::Error(_)));
        m.submit("Oslo").unwrap();
        assert_eq!(*m.state(), PipelineState::ResolvingCity);
    }

    #[test]
    fn empty_query_is_rejected_without_state_change() {
        let mut m = PipelineMachine::new();
        assert_eq!(m.submit("   "), Err(EmptyQuery));
        assert_eq!(*m.state(), PipelineState::Idle);
        assert!(m.snapshot().query.is_none());
    }

    #[test]
    fn geocode_success_stores_coordinate() {
        let mut m = PipelineMachine::new();
        let t = m.submit("London").unwrap();
        let ft = m.geocode_finished(&t, Ok(LONDON)).unwrap();

        assert_eq!(*m.state(), PipelineState::ResolvingForecast);
        assert_eq!(m.coordinate(), LONDON);
        assert_eq!(ft.coordinate, LONDON);
    }

    #[test]
    fn geocode_failure_clears_previous_forecast_and_keeps_coordinate() {
        let mut m = PipelineMachine::new();
        let t = m.submit("London").unwrap();
        let ft = m.geocode_finished(&t, Ok(LONDON)).unwrap();
        m.forecast_finished(ft, Ok(forecast(10.0, 0)));

        let t = m.submit("Atlantis").unwrap();
        assert!(m.geocode_finished(&t, Err(LookupError::NotFound)).is_none());

        assert_eq!(*m.state(), PipelineState::Error(LookupError::NotFound));
        assert!(m.state().forecast().is_none());
        assert_eq!(m.coordinate(), LONDON);
    }

    #[test]
    fn forecast_failure_replaces_ready() {
        let mut m = PipelineMachine::new();
        let t = m.submit("London").unwrap();
        let ft = m.geocode_finished(&t, Ok(LONDON)).unwrap();
        m.forecast_finished(ft, Ok(forecast(10.0, 0)));

        let t = m.submit("Paris").unwrap();
        let ft = m.geocode_finished(&t, Ok(PARIS)).unwrap();
        let err = LookupError::ForecastNetwork { detail: "timeout".into() };
        assert!(m.forecast_finished(ft, Err(err.clone())));

        assert_eq!(*m.state(), PipelineState::Error(err));
    }

    #[test]
    fn stale_forecast_is_discarded() {
        let mut m = PipelineMachine::new();

        let a = m.submit("Paris").unwrap();
        let a_ft = m.geocode_finished(&a, Ok(PARIS)).unwrap();

        let b = m.submit("London").unwrap();
        let b_ft = m.geocode_finished(&b, Ok(LONDON)).unwrap();
        assert!(m.forecast_finished(b_ft, Ok(forecast(12.0, 3))));

        assert!(!m.forecast_finished(a_ft, Ok(forecast(25.0, 0))));
        assert_eq!(*m.state(), PipelineState::Ready(forecast(12.0, 3)));
        assert_eq!(m.coordinate(), LONDON);
    }

    #[test]
    fn stale_failure_is_discarded() {
        let mut m = PipelineMachine::new();

        let a = m.submit("Paris").unwrap();
        let a_ft = m.geocode_finished(&a, Ok(PARIS)).unwrap();
        let b = m.submit("London").unwrap();

        let err = LookupError::ForecastNetwork { detail: "late".into() };
        assert!(!m.forecast_finished(a_ft, Err(err)));
        assert_eq!(*m.state(), PipelineState::ResolvingCity);

        let b_ft = m.geocode_finished(&b, Ok(LONDON)).unwrap();
        assert_eq!(b_ft.coordinate, LONDON);
    }

    #[test]
    fn stale_geocode_does_not_move_coordinate() {
        let mut m = PipelineMachine::new();

        let a = m.submit("Paris").unwrap();
        let b = m.submit("London").unwrap();

        assert!(m.geocode_finished(&a, Ok(PARIS)).is_none());
        assert_eq!(m.coordinate(), Coordinate::FALLBACK);
        assert_eq!(*m.state(), PipelineState::ResolvingCity);

        m.geocode_finished(&b, Ok(LONDON)).unwrap();
        assert_eq!(m.coordinate(), LONDON);
    }

    // ---- async driver ----

    #[derive(Debug, Default)]
    struct FakeGeocoder {
        places: HashMap<String, Coordinate>,
    }

    impl FakeGeocoder {
        fn with(places: &[(&str, Coordinate)]) -> Self {
            Self { places: places.iter().map(|(n, c)| (n.to_string(), *c)).collect() }
        }
    }

    #[async_trait]
    impl GeocodingResolver for FakeGeocoder {
        async fn resolve(&self, city: &CityQuery) -> Result<Coordinate, LookupError> {
            self.places.get(city.as_str()).copied().ok_or(LookupError::NotFound)
        }
    }

    #[derive(Debug, Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ForecastFetcher for CountingFetcher {
        async fn fetch(&self, coord: Coordinate) -> Result<ForecastData, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LookupError::ForecastNetwork { detail: "503".into() });
            }
            Ok(forecast(coord.latitude, 0))
        }
    }

    /// Holds each fetch until the test releases it.
    #[derive(Debug)]
    struct GatedFetcher {
        started: mpsc::UnboundedSender<(Coordinate, oneshot::Sender<()>)>,
    }

    #[async_trait]
    impl ForecastFetcher for GatedFetcher {
        async fn fetch(&self, coord: Coordinate) -> Result<ForecastData, LookupError> {
            let (release, gate) = oneshot::channel();
            let _ = self.started.send((coord, release));
            let _ = gate.await;
            Ok(forecast(coord.latitude, 1))
        }
    }

    /// Holds each geocode until the test releases it.
    #[derive(Debug)]
    struct GatedGeocoder {
        coordinate: Coordinate,
        started: mpsc::UnboundedSender<oneshot::Sender<()>>,
    }

    #[async_trait]
    impl GeocodingResolver for GatedGeocoder {
        async fn resolve(&self, _city: &CityQuery) -> Result<Coordinate, LookupError> {
            let (release, gate) = oneshot::channel();
            let _ = self.started.send(release);
            let _ = gate.await;
            Ok(self.coordinate)
        }
    }

    #[tokio::test]
    async fn search_reaches_ready() {
        let pipeline = ResolutionPipeline::new(
            FakeGeocoder::with(&[("London", LONDON)]),
            CountingFetcher::default(),
        );

        let snap = pipeline.search("London").await.unwrap();

        assert_eq!(snap.coordinate, LONDON);
        assert_eq!(snap.query.as_ref().map(CityQuery::as_str), Some("London"));
        assert_eq!(snap.state, PipelineState::Ready(forecast(LONDON.latitude, 0)));
        assert_eq!(pipeline.snapshot(), snap);
    }

    #[tokio::test]
    async fn not_found_never_fetches_forecast() {
        let fetcher = std::sync::Arc::new(CountingFetcher::default());
        let pipeline = ResolutionPipeline::new(FakeGeocoder::default(), fetcher.clone());

        let snap = pipeline.search("Nowhere").await.unwrap();

        assert_eq!(snap.state, PipelineState::Error(LookupError::NotFound));
        assert_eq!(LookupError::NotFound.to_string(), "City not found. Please try another name.");
        assert_eq!(snap.coordinate, Coordinate::FALLBACK);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forecast_failure_surfaces_forecast_error() {
        let pipeline = ResolutionPipeline::new(
            FakeGeocoder::with(&[("London", LONDON)]),
            CountingFetcher { fail: true, ..Default::default() },
        );

        let snap = pipeline.search("London").await.unwrap();

        match snap.state {
            PipelineState::Error(err) => assert_eq!(err.to_string(), "Failed to fetch weather data"),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(snap.coordinate, LONDON);
    }

    #[tokio::test]
    async fn empty_search_is_rejected() {
        let pipeline = ResolutionPipeline::new(FakeGeocoder::default(), CountingFetcher::default());
        assert_eq!(pipeline.search("  ").await, Err(EmptyQuery));
        assert_eq!(pipeline.snapshot().state, PipelineState::Idle);
    }

    #[tokio::test]
    async fn subscribers_see_each_transition() {
        let pipeline = ResolutionPipeline::new(
            FakeGeocoder::with(&[("London", LONDON)]),
            CountingFetcher::default(),
        );
        let mut rx = pipeline.subscribe();

        pipeline.search("London").await.unwrap();

        assert!(rx.has_changed().unwrap());
        let latest = rx.borrow_and_update().clone();
        assert!(matches!(latest.state, PipelineState::Ready(_)));
    }

    #[tokio::test]
    async fn loading_states_are_published_before_ready() {
        let (geo_tx, mut geo_rx) = mpsc::unbounded_channel();
        let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();
        let pipeline = ResolutionPipeline::new(
            GatedGeocoder { coordinate: LONDON, started: geo_tx },
            GatedFetcher { started: fetch_tx },
        );
        let mut rx = pipeline.subscribe();

        let watcher = async {
            let mut seen = Vec::new();

            rx.changed().await.unwrap();
            seen.push(rx.borrow_and_update().state.clone());
            geo_rx.recv().await.unwrap().send(()).unwrap();

            let (_, release) = fetch_rx.recv().await.unwrap();
            rx.changed().await.unwrap();
            seen.push(rx.borrow_and_update().state.clone());
            release.send(()).unwrap();

            rx.changed().await.unwrap();
            seen.push(rx.borrow_and_update().state.clone());
            seen
        };

        let (result, seen) = tokio::join!(pipeline.search("London"), watcher);
        result.unwrap();

        assert_eq!(
            seen,
            vec![
                PipelineState::ResolvingCity,
                PipelineState::ResolvingForecast,
                PipelineState::Ready(forecast(LONDON.latitude, 1)),
            ]
        );
    }

    #[tokio::test]
    async fn search_observed_reports_loading_screen() {
        let (geo_tx, mut geo_rx) = mpsc::unbounded_channel();
        let pipeline = ResolutionPipeline::new(
            GatedGeocoder { coordinate: LONDON, started: geo_tx },
            CountingFetcher::default(),
        );

        let mut seen = Vec::new();
        let release = async {
            geo_rx.recv().await.unwrap().send(()).unwrap();
        };
        let (result, ()) = tokio::join!(
            pipeline.search_observed("London", |snap| seen.push(snap.state.clone())),
            release
        );

        let snap = result.unwrap();
        assert!(matches!(snap.state, PipelineState::Ready(_)));
        assert_eq!(seen.first(), Some(&PipelineState::ResolvingCity));
        assert!(!seen.iter().any(|s| matches!(s, PipelineState::Error(_))));
    }

    #[tokio::test]
    async fn superseded_forecast_does_not_overwrite_newer_result() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let pipeline = ResolutionPipeline::new(
            FakeGeocoder::with(&[("Paris", PARIS), ("London", LONDON)]),
            GatedFetcher { started: started_tx },
        );
        let mut updates = pipeline.subscribe();

        let search_a = pipeline.search("Paris");
        let search_b = async {
            // Wait until Paris' forecast is in flight, then submit London.
            let (coord, release_a) = started_rx.recv().await.unwrap();
            assert_eq!(coord, PARIS);

            let driver = async {
                let (coord, release_b) = started_rx.recv().await.unwrap();
                assert_eq!(coord, LONDON);
                release_b.send(()).unwrap();

                updates
                    .wait_for(|s| matches!(s.state, PipelineState::Ready(_)))
                    .await
                    .unwrap();
                release_a.send(()).unwrap();
            };

            let (b, ()) = tokio::join!(pipeline.search("London"), driver);
            b
        };

        let (a, b) = tokio::join!(search_a, search_b);
        a.unwrap();
        b.unwrap();

        let snap = pipeline.snapshot();
        assert_eq!(snap.coordinate, LONDON);
        assert_eq!(snap.query.as_ref().map(CityQuery::as_str), Some("London"));
        assert_eq!(snap.state, PipelineState::Ready(forecast(LONDON.latitude, 1)));
    }
}
