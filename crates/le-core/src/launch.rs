//! Launch orchestration: flags → credentials → gate decisions → adapters.
//!
//! Runs exactly once per process. There are no retries and no cycles:
//! `Init → ResolvingCredentials → Deciding → Launching → Running`. Once an
//! adapter is started the orchestrator keeps no handle to it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    credentials::{CredentialAcquirer, EnvSource},
    domain::{Mode, Platform, PlatformCredential},
    engine::Core,
    gate::{self, GateDecision, GateOutcome},
    secrets::{SecretIdentifiers, SecretStore},
    Result,
};

/// Selects the development secrets.
pub const DEV_FLAG: &str = "--dev";

/// What the operator asked for on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    pub telegram: bool,
    pub discord: bool,
    pub mode: Mode,
}

impl LaunchRequest {
    /// Presence-only flags, order independent. Unknown arguments are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut req = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            if arg == DEV_FLAG {
                req.mode = Mode::Alternate;
            } else if let Some(platform) = Platform::ALL.into_iter().find(|p| p.flag() == arg) {
                match platform {
                    Platform::Telegram => req.telegram = true,
                    Platform::Discord => req.discord = true,
                }
            } else {
                tracing::debug!("ignoring argument {arg:?}");
            }
        }
        req
    }

    pub fn is_requested(&self, platform: Platform) -> bool {
        match platform {
            Platform::Telegram => self.telegram,
            Platform::Discord => self.discord,
        }
    }

    pub fn any_requested(&self) -> bool {
        self.telegram || self.discord
    }
}

/// A platform bot bound to the shared engine.
#[async_trait]
pub trait PlatformAdapter: Send {
    fn platform(&self) -> Platform;

    /// Connect and hand the event loop off to the runtime. Returns once the
    /// bot is running; failures here propagate to the process boundary.
    async fn start(self: Box<Self>) -> Result<()>;
}

/// Constructs adapters for `Start` decisions.
pub trait AdapterFactory: Send + Sync {
    fn build(
        &self,
        credential: PlatformCredential,
        engine: Arc<Core>,
    ) -> Result<Box<dyn PlatformAdapter>>;
}

/// Operator-facing, non-fatal problems found while launching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    NoPlatformRequested,
    CredentialMissing(Platform),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchPhase {
    Init,
    ResolvingCredentials,
    Deciding,
    Launching,
    Running,
}

/// Summary of one orchestrator run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchReport {
    /// One entry per platform, in launch order. Unrequested platforms are `Skip`.
    pub decisions: Vec<(Platform, GateOutcome)>,
    pub started: Vec<Platform>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LaunchReport {
    pub fn decision(&self, platform: Platform) -> Option<GateOutcome> {
        self.decisions
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, o)| *o)
    }
}

pub struct LaunchOrchestrator<'a> {
    store: &'a dyn SecretStore,
    env: &'a dyn EnvSource,
    ids: &'a SecretIdentifiers,
    factory: &'a dyn AdapterFactory,
    engine: Arc<Core>,
}

impl<'a> LaunchOrchestrator<'a> {
    pub fn new(
        store: &'a dyn SecretStore,
        env: &'a dyn EnvSource,
        ids: &'a SecretIdentifiers,
        factory: &'a dyn AdapterFactory,
        engine: Arc<Core>,
    ) -> Self {
        Self {
            store,
            env,
            ids,
            factory,
            engine,
        }
    }

    pub async fn run(&self, request: &LaunchRequest) -> Result<LaunchReport> {
        enter(LaunchPhase::Init);
        tracing::info!(
            dev_mode = request.mode.is_alternate(),
            telegram = request.telegram,
            discord = request.discord,
            "launch requested"
        );

        enter(LaunchPhase::ResolvingCredentials);
        let acquirer = CredentialAcquirer::new(self.store, self.env, self.ids);
        let (telegram, discord) = tokio::join!(
            acquire_if_requested(&acquirer, request, Platform::Telegram),
            acquire_if_requested(&acquirer, request, Platform::Discord),
        );

        enter(LaunchPhase::Deciding);
        let mut report = LaunchReport::default();
        let mut to_start = Vec::new();
        for (platform, credential) in [(Platform::Telegram, telegram), (Platform::Discord, discord)]
        {
            let decision = gate::decide(platform, request.is_requested(platform), credential);
            report.decisions.push((platform, decision.outcome()));
            match decision {
                GateDecision::Start(credential) => to_start.push(credential),
                GateDecision::Error => report
                    .diagnostics
                    .push(Diagnostic::CredentialMissing(platform)),
                GateDecision::Skip => {}
            }
        }
        if !request.any_requested() {
            let flags = Platform::ALL.map(Platform::flag).join(", ");
            tracing::error!("You must run bot for at least one platform! ({flags})");
            report.diagnostics.push(Diagnostic::NoPlatformRequested);
        }

        // A failing platform must not keep the others from starting; the first
        // failure is still returned once every adapter has been tried.
        enter(LaunchPhase::Launching);
        let mut first_err = None;
        for credential in to_start {
            let platform = credential.platform;
            let started = match self.factory.build(credential, self.engine.clone()) {
                Ok(adapter) => adapter.start().await,
                Err(e) => Err(e),
            };
            match started {
                Ok(()) => {
                    tracing::info!(%platform, "bot started");
                    report.started.push(platform);
                }
                Err(e) => {
                    tracing::error!(%platform, "bot failed to start: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        enter(LaunchPhase::Running);
        Ok(report)
    }
}

async fn acquire_if_requested(
    acquirer: &CredentialAcquirer<'_>,
    request: &LaunchRequest,
    platform: Platform,
) -> Option<PlatformCredential> {
    if !request.is_requested(platform) {
        return None;
    }
    acquirer.acquire(platform, request.mode).await
}

fn enter(phase: LaunchPhase) {
    tracing::debug!(?phase, "launch phase");
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::sync::Notify;

    use super::*;
    use crate::{
        credentials::tests::{FakeEnv, FakeStore},
        engine::{tests::test_config, PassthroughTranslator},
        errors::Error,
        secrets::SecretLookup,
    };

    #[derive(Default)]
    struct FakeFactory {
        built: Arc<Mutex<Vec<(Platform, String)>>>,
        started: Arc<Mutex<Vec<Platform>>>,
        fail_start: Option<Platform>,
    }

    struct FakeAdapter {
        platform: Platform,
        started: Arc<Mutex<Vec<Platform>>>,
        fail: bool,
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn start(self: Box<Self>) -> Result<()> {
            if self.fail {
                return Err(Error::AdapterStart {
                    platform: self.platform,
                    reason: "boom".to_string(),
                });
            }
            self.started.lock().unwrap().push(self.platform);
            Ok(())
        }
    }

    impl AdapterFactory for FakeFactory {
        fn build(
            &self,
            credential: PlatformCredential,
            _engine: Arc<Core>,
        ) -> Result<Box<dyn PlatformAdapter>> {
            self.built
                .lock()
                .unwrap()
                .push((credential.platform, credential.token.clone()));
            Ok(Box::new(FakeAdapter {
                platform: credential.platform,
                started: self.started.clone(),
                fail: self.fail_start == Some(credential.platform),
            }))
        }
    }

    impl FakeFactory {
        fn built(&self) -> Vec<(Platform, String)> {
            self.built.lock().unwrap().clone()
        }

        fn started(&self) -> Vec<Platform> {
            self.started.lock().unwrap().clone()
        }
    }

    fn engine() -> Arc<Core> {
        Arc::new(Core::new(test_config(), Arc::new(PassthroughTranslator)))
    }

    fn ids() -> SecretIdentifiers {
        SecretIdentifiers::new("tg", "tg-dev", "dc")
    }

    async fn run(
        args: &[&str],
        store: &FakeStore,
        env: &FakeEnv,
        factory: &FakeFactory,
    ) -> Result<LaunchReport> {
        let ids = ids();
        let orchestrator = LaunchOrchestrator::new(store, env, &ids, factory, engine());
        orchestrator.run(&LaunchRequest::from_args(args)).await
    }

    #[test]
    fn flags_are_presence_only_and_order_independent() {
        let a = LaunchRequest::from_args(["--dev", "--discord", "extra", "--telegram"]);
        let b = LaunchRequest::from_args(["--telegram", "--discord", "--dev"]);
        assert_eq!(a, b);
        assert!(a.telegram && a.discord);
        assert_eq!(a.mode, Mode::Alternate);

        let none = LaunchRequest::from_args(Vec::<String>::new());
        assert!(!none.any_requested());
        assert_eq!(none.mode, Mode::Standard);
    }

    #[tokio::test]
    async fn telegram_falls_back_to_env_and_discord_is_skipped() {
        let store = FakeStore::default();
        let env = FakeEnv::default().with("TELEGRAM_TOKEN", "abc123");
        let factory = FakeFactory::default();

        let report = run(&["--telegram"], &store, &env, &factory).await.unwrap();

        assert_eq!(
            factory.built(),
            vec![(Platform::Telegram, "abc123".to_string())]
        );
        assert_eq!(report.decision(Platform::Telegram), Some(GateOutcome::Start));
        assert_eq!(report.decision(Platform::Discord), Some(GateOutcome::Skip));
        assert_eq!(report.started, vec![Platform::Telegram]);
        assert!(report.diagnostics.is_empty());
        assert_eq!(store.calls(), vec!["tg".to_string()]);
    }

    #[tokio::test]
    async fn no_flags_reports_once_and_starts_nothing() {
        let store = FakeStore::default()
            .with("tg", SecretLookup::Found("t".into()))
            .with("dc", SecretLookup::Found("d".into()));
        let env = FakeEnv::default();
        let factory = FakeFactory::default();

        let report = run(&[], &store, &env, &factory).await.unwrap();

        assert!(report
            .decisions
            .iter()
            .all(|(_, o)| *o != GateOutcome::Start));
        assert_eq!(report.diagnostics, vec![Diagnostic::NoPlatformRequested]);
        assert!(factory.built().is_empty());
    }

    #[tokio::test]
    async fn one_store_failure_does_not_affect_the_other_platform() {
        let store = FakeStore::default()
            .with("tg", SecretLookup::TransientFailure("503".into()))
            .with("dc", SecretLookup::Found("discord-token".into()));
        let env = FakeEnv::default();
        let factory = FakeFactory::default();

        let report = run(&["--telegram", "--discord"], &store, &env, &factory)
            .await
            .unwrap();

        assert_eq!(report.decision(Platform::Telegram), Some(GateOutcome::Error));
        assert_eq!(report.decision(Platform::Discord), Some(GateOutcome::Start));
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::CredentialMissing(Platform::Telegram)]
        );
        assert_eq!(
            factory.built(),
            vec![(Platform::Discord, "discord-token".to_string())]
        );
        assert_eq!(env.reads(), vec!["TELEGRAM_TOKEN".to_string()]);
    }

    #[tokio::test]
    async fn dev_flag_selects_development_secret() {
        let store = FakeStore::default().with("tg-dev", SecretLookup::Found("dev".into()));
        let env = FakeEnv::default();
        let factory = FakeFactory::default();

        run(&["--telegram", "--dev"], &store, &env, &factory)
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["tg-dev".to_string()]);
        assert_eq!(factory.built(), vec![(Platform::Telegram, "dev".to_string())]);
    }

    #[tokio::test]
    async fn exactly_one_decision_per_platform_for_every_request() {
        for args in [
            vec![],
            vec!["--telegram"],
            vec!["--discord"],
            vec!["--telegram", "--discord"],
            vec!["--dev"],
            vec!["--telegram", "--discord", "--dev"],
        ] {
            let store = FakeStore::default();
            let env = FakeEnv::default().with("DISCORD_TOKEN", "d");
            let factory = FakeFactory::default();
            let req = LaunchRequest::from_args(&args);

            let report = run(&args, &store, &env, &factory).await.unwrap();

            assert_eq!(report.decisions.len(), Platform::ALL.len());
            for platform in Platform::ALL {
                let outcome = report.decision(platform).unwrap();
                assert_eq!(outcome != GateOutcome::Skip, req.is_requested(platform));
            }
            let missing = report
                .diagnostics
                .iter()
                .filter(|d| matches!(d, Diagnostic::CredentialMissing(_)))
                .count();
            assert_eq!(missing, usize::from(req.telegram));
        }
    }

    #[tokio::test]
    async fn missing_credentials_construct_no_adapter() {
        let store = FakeStore::default().with("dc", SecretLookup::NotFound);
        let env = FakeEnv::default().with("DISCORD_TOKEN", "");
        let factory = FakeFactory::default();

        let report = run(&["--discord"], &store, &env, &factory).await.unwrap();

        assert_eq!(report.decision(Platform::Discord), Some(GateOutcome::Error));
        assert!(factory.built().is_empty());
        assert!(report.started.is_empty());
    }

    #[tokio::test]
    async fn adapter_start_failure_propagates() {
        let store = FakeStore::default()
            .with("tg", SecretLookup::Found("t".into()))
            .with("dc", SecretLookup::Found("d".into()));
        let env = FakeEnv::default();
        let factory = FakeFactory {
            fail_start: Some(Platform::Telegram),
            ..Default::default()
        };

        let err = run(&["--telegram", "--discord"], &store, &env, &factory)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AdapterStart {
                platform: Platform::Telegram,
                ..
            }
        ));
        assert_eq!(
            factory.built(),
            vec![
                (Platform::Telegram, "t".to_string()),
                (Platform::Discord, "d".to_string()),
            ]
        );
        assert_eq!(factory.started(), vec![Platform::Discord]);
    }

    /// Telegram's lookup only completes after Discord's has been issued.
    struct GatedStore {
        discord_seen: Notify,
    }

    #[async_trait]
    impl SecretStore for GatedStore {
        async fn fetch(&self, name: &str) -> SecretLookup {
            match name {
                "tg" => {
                    self.discord_seen.notified().await;
                    SecretLookup::Found("t".into())
                }
                _ => {
                    self.discord_seen.notify_one();
                    SecretLookup::Found("d".into())
                }
            }
        }
    }

    #[tokio::test]
    async fn acquisitions_do_not_wait_on_each_other() {
        let store = GatedStore {
            discord_seen: Notify::new(),
        };
        let env = FakeEnv::default();
        let factory = FakeFactory::default();
        let ids = ids();
        let orchestrator = LaunchOrchestrator::new(&store, &env, &ids, &factory, engine());

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run(&LaunchRequest::from_args(["--telegram", "--discord"])),
        )
        .await
        .expect("telegram acquisition blocked discord")
        .unwrap();

        assert_eq!(report.started, vec![Platform::Telegram, Platform::Discord]);
        assert!(env.reads().is_empty());
    }
}
