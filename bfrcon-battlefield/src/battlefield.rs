//! The admin client.
//!
//! [`Battlefield`] wraps one [`Rcon`] connection: it logs in on connect,
//! turns server events into [`GameEvent`]s and exposes the admin command
//! set as typed async methods.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bfrcon_core::{Argument, Lifecycle, Rcon, Request, args};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::BattlefieldConfig;
use crate::error::{BattlefieldError, Result};
use crate::events::{self, AddressCache, GameEvent};
use crate::info::{
    BanEntry, MapEntry, MapIndices, Rounds, ServerInfo, ServerVersion, parse_bans, parse_maps,
    parse_pair, parse_server_info,
};
use crate::list::{Player, WordCursor, parse_players};
use crate::subset::{BanId, BanTimeout, PlayerSubset};
use crate::variables::Variables;

/// Subscriber capacity for game events.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Battlefield {
    rcon: Rcon,
    config: BattlefieldConfig,
    events: broadcast::Sender<GameEvent>,
    addresses: Arc<AddressCache>,
    version: Arc<Mutex<Option<ServerVersion>>>,
}

/// `MD5(salt || password)` as uppercase hex.
pub fn password_hash(salt: &[u8], password: &str) -> String {
    let mut context = md5::Context::new();
    context.consume(salt);
    context.consume(password.as_bytes());
    format!("{:X}", context.compute())
}

impl Battlefield {
    /// Build a client without connecting.
    pub fn new(config: BattlefieldConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let addresses = Arc::new(AddressCache::default());

        let rcon = {
            let events = events.clone();
            let addresses = Arc::clone(&addresses);
            Rcon::new(config.rcon.clone(), move |name, words| {
                events::publish(name, words, &addresses, &events);
            })
        };

        Self {
            rcon,
            config,
            events,
            addresses,
            version: Arc::new(Mutex::new(None)),
        }
    }

    /// Build a client and connect it.
    pub async fn open(config: BattlefieldConfig) -> Result<Self> {
        let client = Self::new(config);
        client.connect().await?;
        Ok(client)
    }

    /// Connect, log in and quit again.
    pub async fn test_connection(config: BattlefieldConfig) -> Result<()> {
        let client = Self::open(config).await?;
        client.quit();
        Ok(())
    }

    pub fn rcon(&self) -> &Rcon {
        &self.rcon
    }

    pub fn config(&self) -> &BattlefieldConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Socket-level notifications; `Closed` is the cue to reconnect.
    pub fn lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
        self.rcon.subscribe()
    }

    /// The game and build learned on connect.
    pub fn server_version(&self) -> Option<ServerVersion> {
        self.version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Session ──────────────────────────────────────────────────

    /// Open the socket and run the login sequence. If login fails the
    /// socket is closed again.
    pub async fn connect(&self) -> Result<()> {
        self.rcon.connect().await?;
        if let Err(e) = self.initialize().await {
            warn!("initialization failed: {e}");
            self.rcon.stop();
            return Err(e);
        }
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        let version = self.read_version(true).await?;
        debug!("server runs {:?} build {}", version.game, version.build);
        self.login(&self.config.auth.password).await?;
        if self.config.events.enabled {
            self.enable_events(true).await?;
        }
        info!("ready");
        Ok(())
    }

    /// Sleep, try `connect`, repeat. `max_attempts <= 0` retries forever.
    pub async fn reconnect(&self, max_attempts: i32, delay: Duration) -> Result<()> {
        let mut attempts: u32 = 0;
        loop {
            if max_attempts > 0 && attempts >= max_attempts.unsigned_abs() {
                return Err(BattlefieldError::ReconnectFailed { attempts });
            }
            attempts += 1;
            tokio::time::sleep(delay).await;
            match self.connect().await {
                Ok(()) => {
                    info!("reconnected after {attempts} attempt(s)");
                    return Ok(());
                }
                Err(e) => warn!("reconnect attempt #{attempts} failed: {e}"),
            }
        }
    }

    pub async fn reconnect_with_config(&self) -> Result<()> {
        let policy = &self.config.reconnect;
        self.reconnect(policy.max_attempts, policy.delay()).await
    }

    /// Close the socket.
    pub fn quit(&self) {
        self.rcon.stop();
    }

    // ── Plumbing ─────────────────────────────────────────────────

    /// Raw command access.
    pub fn command<I, A>(&self, name: &str, args: I) -> Request
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.rcon.create_command(name, args)
    }

    async fn run<I, A>(&self, name: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.command(name, args).send().await?;
        Ok(())
    }

    async fn run_and_save<I, A>(&self, name: &str, args: I, save: Option<&str>) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.run(name, args).await?;
        if let Some(save) = save {
            self.run(save, args![]).await?;
        }
        Ok(())
    }

    async fn list(&self, name: &str, offset: Option<u32>) -> Result<Vec<String>> {
        Ok(self.command(name, [offset]).send().await?)
    }

    // ── Login ────────────────────────────────────────────────────

    /// `version`, sent ahead of other traffic. Rejects games this client
    /// does not speak.
    pub async fn version(&self) -> Result<ServerVersion> {
        self.read_version(false).await
    }

    /// With `hold_gate`, ordinary traffic stays blocked after the reply
    /// until a login completes.
    async fn read_version(&self, hold_gate: bool) -> Result<ServerVersion> {
        let request = self.command("version", args![]).drop_on_disconnect();
        let request = if hold_gate {
            request.hold_gate()
        } else {
            request.priorize()
        };
        let (game, build) = request
            .try_format(|words| {
                let c = &mut WordCursor::new(words);
                Ok((c.text()?, c.text()?))
            })
            .send()
            .await?;
        let version = ServerVersion::parse(&game, &build)?;
        *self.version.lock().unwrap_or_else(PoisonError::into_inner) = Some(version.clone());
        Ok(version)
    }

    /// Hashed login: fetch a salt, answer with `MD5(salt || password)`.
    /// Both steps jump the queue; ordinary traffic resumes only once the
    /// hash is answered.
    pub async fn login(&self, password: &str) -> Result<()> {
        let salt = self
            .command("login.hashed", args![])
            .hold_gate()
            .drop_on_disconnect()
            .try_format(|words| Ok(WordCursor::new(words).text()?))
            .send()
            .await?;
        let salt = hex::decode(salt)?;

        self.command("login.hashed", [password_hash(&salt, password)])
            .priorize()
            .drop_on_disconnect()
            .send()
            .await?;
        info!("logged in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.run("logout", args![]).await
    }

    pub async fn enable_events(&self, enabled: bool) -> Result<()> {
        self.command("admin.eventsEnabled", [enabled])
            .drop_on_disconnect()
            .send()
            .await?;
        Ok(())
    }

    pub async fn help(&self) -> Result<Vec<String>> {
        Ok(self.command("admin.help", args![]).send().await?)
    }

    // ── Players ──────────────────────────────────────────────────

    /// Players in `subset`, with addresses filled in from PunkBuster
    /// where the listing has none.
    pub async fn players(&self, subset: &PlayerSubset) -> Result<Vec<Player>> {
        let mut players = self
            .command("admin.listPlayers", subset.to_arguments())
            .try_format(parse_players)
            .send()
            .await?;
        self.addresses.annotate(&mut players);
        Ok(players)
    }

    pub async fn player(&self, name: &str) -> Result<Option<Player>> {
        Ok(self
            .players(&PlayerSubset::All)
            .await?
            .into_iter()
            .find(|p| p.name == name))
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        Ok(self
            .command("serverInfo", args![])
            .try_format(parse_server_info)
            .send()
            .await?)
    }

    pub async fn effective_max_players(&self) -> Result<u32> {
        Ok(self
            .command("admin.effectiveMaxPlayers", args![])
            .try_format(|w| WordCursor::new(w).unsigned())
            .send()
            .await?)
    }

    /// Seconds since the player last did anything.
    pub async fn idle_duration(&self, name: &str) -> Result<f64> {
        Ok(self
            .command("player.idleDuration", [name])
            .try_format(|w| WordCursor::new(w).number())
            .send()
            .await?)
    }

    pub async fn player_alive(&self, name: &str) -> Result<bool> {
        Ok(self
            .command("player.isAlive", [name])
            .try_format(|w| WordCursor::new(w).boolean())
            .send()
            .await?)
    }

    pub async fn player_ping(&self, name: &str) -> Result<i64> {
        Ok(self
            .command("player.ping", [name])
            .try_format(|w| WordCursor::new(w).integer())
            .send()
            .await?)
    }

    pub async fn kick(&self, name: &str, reason: Option<&str>) -> Result<()> {
        self.run("admin.kickPlayer", args![name, reason]).await
    }

    /// Kill without affecting stats.
    pub async fn kill_player(&self, name: &str) -> Result<()> {
        self.run("admin.killPlayer", [name]).await
    }

    /// Only works on dead players unless `force_kill` is set.
    pub async fn move_player(&self, name: &str, team: u32, squad: u32, force_kill: bool) -> Result<()> {
        self.run("admin.movePlayer", args![name, team, squad, force_kill])
            .await
    }

    /// Chat message; under 128 characters.
    pub async fn say(&self, message: &str, subset: &PlayerSubset) -> Result<()> {
        let mut args = args![message];
        args.extend(subset.to_arguments());
        self.run("admin.say", args).await
    }

    /// On-screen message; under 256 characters. The server defaults to 10
    /// seconds and all players.
    pub async fn yell(
        &self,
        message: &str,
        duration: Option<u32>,
        subset: Option<&PlayerSubset>,
    ) -> Result<()> {
        let mut args = args![message, duration];
        if let Some(subset) = subset {
            args.extend(subset.to_arguments());
        }
        self.run("admin.yell", args).await
    }

    // ── PunkBuster ───────────────────────────────────────────────

    pub async fn punkbuster_active(&self) -> Result<bool> {
        Ok(self
            .command("punkBuster.isActive", args![])
            .try_format(|w| WordCursor::new(w).boolean())
            .send()
            .await?)
    }

    pub async fn punkbuster_activate(&self) -> Result<()> {
        self.run("punkBuster.activate", args![]).await
    }

    pub async fn punkbuster_command(&self, command: &str) -> Result<()> {
        self.run("punkBuster.pb_sv_command", [command]).await
    }

    // ── Map list ─────────────────────────────────────────────────

    /// Up to 100 entries starting at `offset`.
    pub async fn maps(&self, offset: Option<u32>) -> Result<Vec<MapEntry>> {
        let start = offset.unwrap_or(0);
        Ok(self
            .command("mapList.list", [offset])
            .try_format(move |w| parse_maps(w, start))
            .send()
            .await?)
    }

    /// Append, or insert before `index`.
    pub async fn add_map(
        &self,
        map: &str,
        mode: &str,
        rounds: u32,
        index: Option<u32>,
        save: bool,
    ) -> Result<()> {
        self.run_and_save(
            "mapList.add",
            args![map, mode, rounds, index],
            save.then_some("mapList.save"),
        )
        .await
    }

    pub async fn remove_map(&self, index: u32, save: bool) -> Result<()> {
        self.run_and_save("mapList.remove", [index], save.then_some("mapList.save"))
            .await
    }

    pub async fn clear_maps(&self, save: bool) -> Result<()> {
        self.run_and_save("mapList.clear", args![], save.then_some("mapList.save"))
            .await
    }

    pub async fn load_maps(&self) -> Result<()> {
        self.run("mapList.load", args![]).await
    }

    pub async fn save_maps(&self) -> Result<()> {
        self.run("mapList.save", args![]).await
    }

    pub async fn set_next_map_index(&self, index: u32) -> Result<()> {
        self.run("mapList.setNextMapIndex", [index]).await
    }

    pub async fn map_indices(&self) -> Result<MapIndices> {
        let (current, next) = self
            .command("mapList.getMapIndices", args![])
            .try_format(parse_pair)
            .send()
            .await?;
        Ok(MapIndices { current, next })
    }

    pub async fn rounds(&self) -> Result<Rounds> {
        let (current, total) = self
            .command("mapList.getRounds", args![])
            .try_format(parse_pair)
            .send()
            .await?;
        Ok(Rounds { current, total })
    }

    /// Skip to the next round without the end-of-round sequence.
    pub async fn next_round(&self) -> Result<()> {
        self.run("mapList.runNextRound", args![]).await
    }

    pub async fn restart_round(&self) -> Result<()> {
        self.run("mapList.restartRound", args![]).await
    }

    pub async fn end_round(&self, winner: u32) -> Result<()> {
        self.run("mapList.endRound", [winner]).await
    }

    // ── Ban list ─────────────────────────────────────────────────

    pub async fn bans(&self, offset: Option<u32>) -> Result<Vec<BanEntry>> {
        Ok(self
            .command("banList.list", [offset])
            .try_format(parse_bans)
            .send()
            .await?)
    }

    /// Replaces any existing ban on the same id.
    pub async fn add_ban(
        &self,
        id: &BanId,
        timeout: BanTimeout,
        reason: Option<&str>,
        save: bool,
    ) -> Result<()> {
        let mut args = id.to_arguments();
        args.extend(timeout.to_arguments());
        args.push(reason.into());
        self.run_and_save("banList.add", args, save.then_some("banList.save"))
            .await
    }

    pub async fn remove_ban(&self, id: &BanId, save: bool) -> Result<()> {
        self.run_and_save("banList.remove", id.to_arguments(), save.then_some("banList.save"))
            .await
    }

    pub async fn clear_bans(&self, save: bool) -> Result<()> {
        self.run_and_save("banList.clear", args![], save.then_some("banList.save"))
            .await
    }

    pub async fn load_bans(&self) -> Result<()> {
        self.run("banList.load", args![]).await
    }

    pub async fn save_bans(&self) -> Result<()> {
        self.run("banList.save", args![]).await
    }

    // ── Reserved slots ───────────────────────────────────────────

    pub async fn reserved_slots(&self, offset: Option<u32>) -> Result<Vec<String>> {
        self.list("reservedSlotsList.list", offset).await
    }

    pub async fn add_reserved_slot(&self, name: &str, save: bool) -> Result<()> {
        self.run_and_save(
            "reservedSlotsList.add",
            [name],
            save.then_some("reservedSlotsList.save"),
        )
        .await
    }

    pub async fn remove_reserved_slot(&self, name: &str, save: bool) -> Result<()> {
        self.run_and_save(
            "reservedSlotsList.remove",
            [name],
            save.then_some("reservedSlotsList.save"),
        )
        .await
    }

    pub async fn clear_reserved_slots(&self, save: bool) -> Result<()> {
        self.run_and_save(
            "reservedSlotsList.clear",
            args![],
            save.then_some("reservedSlotsList.save"),
        )
        .await
    }

    pub async fn load_reserved_slots(&self) -> Result<()> {
        self.run("reservedSlotsList.load", args![]).await
    }

    pub async fn save_reserved_slots(&self) -> Result<()> {
        self.run("reservedSlotsList.save", args![]).await
    }

    pub async fn aggressive_join(&self, enabled: bool) -> Result<()> {
        self.run("reservedSlotsList.aggressiveJoin", [enabled]).await
    }

    // ── Mods (Venice Unleashed) ──────────────────────────────────

    /// Mods loaded on the next restart.
    pub async fn mods(&self) -> Result<Vec<String>> {
        self.list("modList.List", None).await
    }

    pub async fn available_mods(&self) -> Result<Vec<String>> {
        self.list("modList.Available", None).await
    }

    pub async fn running_mods(&self) -> Result<Vec<String>> {
        self.list("modList.ListRunning", None).await
    }

    pub async fn add_mod(&self, name: &str) -> Result<()> {
        self.run("modList.Add", [name]).await
    }

    pub async fn remove_mod(&self, name: &str) -> Result<()> {
        self.run("modList.Remove", [name]).await
    }

    pub async fn clear_mods(&self) -> Result<()> {
        self.run("modList.Clear", args![]).await
    }

    pub async fn reload_extensions(&self) -> Result<()> {
        self.run("modList.ReloadExtensions", args![]).await
    }

    pub async fn debug_extensions(&self, enabled: bool) -> Result<()> {
        self.run("modList.Debug", [enabled]).await
    }

    // ── Variables ────────────────────────────────────────────────

    pub fn vars(&self) -> Variables {
        Variables::new(self.rcon.clone(), "vars")
    }

    pub fn vu(&self) -> Variables {
        Variables::new(self.rcon.clone(), "vu")
    }
}
