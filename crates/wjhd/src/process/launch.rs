//! Supervises daemon launch sequencing and teardown.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{info, warn};

use wjh_config::{Config, RuntimePaths};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::channel::EngineChannelFactory;
use crate::dispatch::Dispatcher;
use crate::engine::{ChannelMode, EngineInitParams, SharedEngine, SoftwareEngine};
use crate::feed::{
    DatagramFeed, GlobalSettings, PersistentFeed, PriorityControl, SettingsStore,
    StartupSettings, SystemPriority,
};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::reactor::{PollMultiplexer, Reactor, ReactorParts};
use crate::registry::{ChannelRegistry, default_catalog};
use crate::resolve::{InterfaceNames, NetDb, ProtocolNames, SystemInterfaceNames};
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::guard::ProcessGuard;
use super::shutdown::install_shutdown_flag;

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) engine: SharedEngine,
    pub(crate) priority: Box<dyn PriorityControl>,
    pub(crate) interfaces: Box<dyn InterfaceNames>,
    pub(crate) protocols: Box<dyn ProtocolNames>,
}

/// Runs the daemon using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: install_shutdown_flag()?,
        engine: Rc::new(RefCell::new(SoftwareEngine::new())),
        priority: Box::new(SystemPriority),
        interfaces: Box::new(SystemInterfaceNames::load()),
        protocols: Box::new(NetDb::load_system()),
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators until the shutdown flag is
/// set, then tears everything down.
pub(crate) fn run_daemon_with<L>(plan: LaunchPlan<L>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
        engine,
        priority,
        interfaces,
        protocols,
    } = plan;

    let daemon = bootstrap_with(&loader, Arc::clone(&reporter))?;
    let config = daemon.config().clone();
    let paths = RuntimePaths::from_config(&config)?;
    let store = SettingsStore::new(paths.settings_path());
    let mut guard = ProcessGuard::acquire(paths)?;
    guard.write_pid(std::process::id())?;

    let listener = SocketListener::bind(config.daemon_socket())?;
    let mut global_feed = PersistentFeed::new(
        DatagramFeed::bind("global", config.global_feed_socket())?,
        store,
    );
    let channel_feed = DatagramFeed::bind("channel", config.channel_feed_socket())?;

    let startup = StartupSettings::seed(&config)
        .overlay(GlobalSettings::from_records(&global_feed.startup_drain()));
    if let Some(level) = startup.nice_level
        && let Err(error) = priority.set_nice(level)
    {
        warn!(
            target: PROCESS_TARGET,
            nice_level = level,
            error = %error,
            "failed to apply startup scheduling priority"
        );
    }

    engine
        .borrow_mut()
        .init(&engine_params(&config, startup.pci_bandwidth))?;
    let mut registry = ChannelRegistry::new();
    let factory = EngineChannelFactory::new(Rc::clone(&engine), ChannelMode::Cyclic);
    if let Err(error) =
        registry.create_default_channels(&default_catalog(), &factory, reporter.as_ref())
    {
        teardown(&mut registry, &engine);
        return Err(error.into());
    }

    let mut reactor = Reactor::new(ReactorParts {
        multiplexer: Box::new(PollMultiplexer::new()),
        listener,
        global_feed: Box::new(global_feed),
        channel_feed: Box::new(channel_feed),
        dispatcher: Dispatcher::new(registry, interfaces, protocols),
        priority,
        reporter: Arc::clone(&reporter),
        shutdown,
        client_timeout: config.client_timeout(),
        pci_bandwidth: startup.pci_bandwidth,
    });
    let outcome = reactor.run();

    let mut registry = reactor.into_dispatcher().into_registry();
    let failures = teardown(&mut registry, &engine);
    reporter.shutdown_completed(failures);
    drop(guard);
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    outcome.map_err(LaunchError::from)
}

fn engine_params(config: &Config, pci_bandwidth: u32) -> EngineInitParams {
    let path = config.engine_config_path();
    let config_path = path.is_file().then(|| path.to_path_buf());
    EngineInitParams::for_daemon(pci_bandwidth, config_path)
}

/// Destroys every channel and releases the engine. Returns the number of
/// channels that did not tear down cleanly.
fn teardown(registry: &mut ChannelRegistry, engine: &SharedEngine) -> usize {
    let failures = registry.destroy_all();
    if let Err(error) = engine.borrow_mut().deinit() {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "engine deinitialisation failed"
        );
    }
    failures
}
