//! Peripheral assembly and the subcommands that drive it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dispenser_config::Config;
use dispenser_core::events::{Event, EventQueue};
use dispenser_core::hw_error::map_hw_error;
use dispenser_core::{
    AxisThresholds, ChangeEvent, Dispenser, DispenserError, DistanceSensor, InputCfg, Notice,
    Sample, SyncCfg, TimeSync,
};
use dispenser_hardware::{SoftRtc, ThreadResolver, UdpDatagram};
use dispenser_traits::{
    AnalogInput, Clock, DatagramSocket, DigitalInput, DigitalOutput, MonotonicClock, PwmOutput,
    RealTimeClock, Resolver,
};
use eyre::{Result, WrapErr};
use serde_json::json;

pub struct Peripherals {
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub trigger: Box<dyn DigitalOutput>,
    pub echo: Box<dyn DigitalInput>,
    pub button: Box<dyn DigitalInput>,
    pub joystick: Box<dyn AnalogInput>,
    pub presence: Box<dyn DigitalInput>,
    pub buzzer: Box<dyn PwmOutput>,
    pub servo: Box<dyn PwmOutput>,
    pub rtc: SoftRtc,
}

pub struct Network {
    pub socket: Box<dyn DatagramSocket>,
    pub resolver: Box<dyn Resolver>,
}

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty() && v != "0")
}

/// Host UDP and DNS with `DISPENSER_REAL_NTP=1` or on hardware; otherwise an
/// in-process server answering with the host clock.
pub fn open_network(cfg: &Config) -> Result<Network> {
    if cfg!(all(feature = "hardware", target_os = "linux")) || env_flag("DISPENSER_REAL_NTP") {
        let socket = UdpDatagram::bind_any().wrap_err("open udp socket")?;
        return Ok(Network {
            socket: Box::new(socket),
            resolver: Box::new(ThreadResolver),
        });
    }
    use dispenser_hardware::sim::{SimNtpServer, StaticResolver};
    let mut server = SimNtpServer::host_time();
    if env_flag("DISPENSER_SIM_NTP_SILENT") {
        server = server.silent();
    }
    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.time_sync.port));
    Ok(Network {
        socket: Box::new(server),
        resolver: Box::new(StaticResolver::new(addr)),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open(_cfg: &Config) -> Result<Peripherals> {
    use dispenser_hardware::sim::{SimButton, SimJoystick, SimPin, SimPwm, SimRanger};

    let distance = if env_flag("DISPENSER_SIM_NO_ECHO") {
        None
    } else {
        let cm = match std::env::var("DISPENSER_SIM_DISTANCE_CM") {
            Ok(v) => v
                .parse::<f32>()
                .wrap_err_with(|| format!("DISPENSER_SIM_DISTANCE_CM={v} is not a number"))?,
            Err(_) => 80.0,
        };
        Some(cm)
    };
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let ranger = SimRanger::new(clock.clone(), distance);
    tracing::info!(?distance, "simulated peripherals");
    Ok(Peripherals {
        trigger: Box::new(ranger.trigger()),
        echo: Box::new(ranger.echo()),
        button: Box::new(SimButton::new()),
        joystick: Box::new(SimJoystick::new()),
        presence: Box::new(SimPin::new(true)),
        buzzer: Box::new(SimPwm::new()),
        servo: Box::new(SimPwm::new()),
        rtc: SoftRtc::new(clock.clone()),
        clock,
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open(cfg: &Config) -> Result<Peripherals> {
    use dispenser_hardware::gpio::{Mcp3208, RpiInput, RpiOutput, RpiPwm};

    let p = &cfg.pins;
    let button = if cfg.input.active_low {
        RpiInput::pull_up(p.button)
    } else {
        RpiInput::pull_down(p.button)
    }
    .wrap_err("open button pin")?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    tracing::info!(
        trigger = p.trigger,
        echo = p.echo,
        servo = p.servo,
        buzzer = p.buzzer,
        "raspberry pi peripherals"
    );
    Ok(Peripherals {
        trigger: Box::new(RpiOutput::new_low(p.trigger).wrap_err("open trigger pin")?),
        echo: Box::new(RpiInput::floating(p.echo).wrap_err("open echo pin")?),
        button: Box::new(button),
        joystick: Box::new(
            Mcp3208::new(p.joystick_channel, cfg.hardware.adc_spi_hz)
                .wrap_err("open joystick adc")?,
        ),
        presence: Box::new(RpiInput::floating(p.presence).wrap_err("open presence pin")?),
        buzzer: Box::new(RpiPwm::new(p.buzzer).wrap_err("open buzzer pin")?),
        servo: Box::new(RpiPwm::new(p.servo).wrap_err("open servo pin")?),
        rtc: SoftRtc::new(clock.clone()),
        clock,
    })
}

fn emit_report(tick: u64, report: &dispenser_core::TickReport, as_json: bool) {
    for notice in &report.notices {
        let line = dispenser_ui::render(notice);
        if as_json {
            let mut obj = json!({
                "tick": tick,
                "state": report.state().as_str(),
                "line": line,
            });
            if let Notice::Monitor {
                distance_cm,
                arm_angle,
                ..
            } = notice
            {
                obj["distance_cm"] = json!(distance_cm);
                obj["arm_angle"] = json!(arm_angle);
            }
            println!("{obj}");
        } else {
            println!("{line}");
        }
    }
}

pub fn run(cfg: &Config, as_json: bool, max_ticks: Option<u64>, shutdown: Arc<AtomicBool>) -> Result<()> {
    let p = open(cfg)?;
    let net = open_network(cfg)?;
    let watcher = p.rtc.spawn_alarm_watcher(
        Duration::from_millis(cfg.hardware.alarm_poll_ms),
        shutdown.clone(),
    );
    let mut dispenser = Dispenser::builder()
        .with_clock(p.clock)
        .with_ranger(p.trigger, p.echo)
        .with_button(p.button)
        .with_joystick(p.joystick)
        .with_presence(p.presence)
        .with_buzzer(p.buzzer)
        .with_servo(p.servo)
        .with_rtc(p.rtc)
        .with_network(net.socket, net.resolver)
        .with_config(cfg)
        .try_build()?;

    let mut tick = 0u64;
    let result = dispenser_core::runner::run(&mut dispenser, &shutdown, max_ticks, |report| {
        tick += 1;
        emit_report(tick, report, as_json);
    });
    shutdown.store(true, Ordering::Relaxed);
    if watcher.join().is_err() {
        tracing::warn!("rtc alarm watcher panicked");
    }
    let ticks = result?;
    if as_json {
        println!(
            "{}",
            json!({ "ticks": ticks, "state": dispenser.state().as_str() })
        );
    } else {
        println!("Stopped after {ticks} ticks in state {}", dispenser.state());
    }
    Ok(())
}

pub fn measure(cfg: &Config, as_json: bool) -> Result<()> {
    let p = open(cfg)?;
    let mut sensor = DistanceSensor::new(p.trigger, p.echo, p.clock, (&cfg.distance).into());
    let cm = sensor.measure().map_err(eyre::Report::new)?;
    let in_range = matches!(
        Sample::classify(Ok(cm), sensor.cfg().max_range_cm),
        Sample::InRange(_)
    );
    if as_json {
        println!("{}", json!({ "distance_cm": cm, "in_range": in_range }));
    } else if in_range {
        println!("Distance: {cm:.2} cm");
    } else {
        println!("Distance: {cm:.2} cm (out of range)");
    }
    Ok(())
}

/// One SNTP exchange outside the automaton. Resolution and the reply each
/// get one response-timeout window.
pub fn sync(cfg: &Config, as_json: bool) -> Result<()> {
    let mut net = open_network(cfg)?;
    let sync_cfg: SyncCfg = (&cfg.time_sync).into();
    let clock = MonotonicClock::new();
    let deadline = clock.now() + sync_cfg.response_timeout * 2;
    let mut sync = TimeSync::new(sync_cfg.clone());
    let events = EventQueue::new();
    sync.start(&mut *net.resolver, &events.sender());

    let time = loop {
        while let Some(ev) = events.try_next() {
            match ev {
                Event::ServerResolved(addr) => sync
                    .on_resolved(addr, &mut *net.socket, clock.now())
                    .map_err(eyre::Report::new)?,
                Event::ResolveFailed(reason) => {
                    return Err(eyre::Report::new(sync.on_resolve_failed(&reason)));
                }
                Event::AlarmFired => {}
            }
        }
        if let Some(t) = sync
            .poll(&mut *net.socket, clock.now())
            .map_err(eyre::Report::new)?
        {
            break t;
        }
        if clock.now() >= deadline {
            return Err(eyre::Report::new(DispenserError::Sync(format!(
                "no reply from {} within {} ms",
                sync_cfg.server,
                sync_cfg.response_timeout.as_millis()
            ))));
        }
        clock.sleep(Duration::from_millis(10));
    };

    let line = dispenser_ui::render(&Notice::ClockSynced {
        time,
        zone_offset_s: sync_cfg.zone_offset_s,
    });
    if as_json {
        println!(
            "{}",
            json!({
                "server": sync.server().map(|a| a.to_string()),
                "local_time": format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
                    time.year, time.month, time.day, time.hour, time.minute, time.second
                ),
                "weekday": time.weekday,
                "zone": dispenser_ui::zone_label(sync_cfg.zone_offset_s),
            })
        );
    } else {
        println!("{line}");
    }
    Ok(())
}

pub fn self_check(cfg: &Config, as_json: bool) -> Result<()> {
    let mut p = open(cfg)?;
    let input: InputCfg = (&cfg.input).into();

    let button = if p.button.is_high() != input.active_low {
        "pressed"
    } else {
        "released"
    };
    let sample = p
        .joystick
        .read()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
        .wrap_err("read joystick")?;
    let position = match AxisThresholds::from(&input).classify(sample) {
        Some(ChangeEvent::Increment) => "up",
        Some(ChangeEvent::Decrement) => "down",
        None if (cfg.input.center_low..=cfg.input.center_high).contains(&sample) => "center",
        None => "off-center",
    };
    let presence = if p.presence.is_high() { "high" } else { "low" };
    let rtc = match p.rtc.datetime() {
        Ok(t) => t.to_string(),
        Err(_) => "not set".to_string(),
    };
    let mut sensor = DistanceSensor::new(p.trigger, p.echo, p.clock, (&cfg.distance).into());
    let distance = sensor.measure();

    if as_json {
        println!(
            "{}",
            json!({
                "button": button,
                "joystick": { "sample": sample, "position": position },
                "presence": presence,
                "rtc": rtc,
                "distance_cm": distance.as_ref().ok(),
                "ok": distance.is_ok(),
            })
        );
    } else {
        println!("button: {button}");
        println!("joystick: {sample} ({position})");
        println!("presence: {presence}");
        println!("rtc: {rtc}");
        match &distance {
            Ok(cm) => println!("distance: {cm:.2} cm"),
            Err(e) => println!("distance: {e}"),
        }
    }
    distance.map_err(eyre::Report::new)?;
    if !as_json {
        println!("self-check: ok");
    }
    Ok(())
}

pub fn health(cfg: &Config, path: Option<&std::path::Path>, as_json: bool) -> Result<()> {
    cfg.validate()
        .map_err(|e| eyre::Report::new(DispenserError::Config(format!("{e:#}"))))?;
    let source = path.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    if as_json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "config": source,
                "time_server": cfg.time_sync.server,
                "alarm_poll_ms": cfg.hardware.alarm_poll_ms,
            })
        );
    } else {
        println!("config ok ({source})");
        println!("time server: {}:{}", cfg.time_sync.server, cfg.time_sync.port);
    }
    Ok(())
}
