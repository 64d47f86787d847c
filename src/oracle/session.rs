use core::mem;
use std::thread;
use std::time::Duration;

use hashbrown::HashSet;
use num::bigint::{BigUint, RandBigInt};
use num::{Integer, One, Zero};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::dlog::{DlogConfig, Subgroup};

use super::{Error, Transport};

/// Rounds the verifier runs before revealing the secret
pub const DEFAULT_ROUNDS: usize = 30;

/// Draws allowed per round before giving up on a usable correlation value
pub const DEFAULT_MAX_DRAWS: usize = 64;

/// Oracle session configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub rounds: usize,
    /// Optional pause after each passed round
    pub pause: Option<Duration>,
    pub max_draws: usize,
    pub dlog: DlogConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            pause: None,
            max_draws: DEFAULT_MAX_DRAWS,
            dlog: DlogConfig::default(),
        }
    }
}

/// Session-wide public parameters: prime modulus, generator, public value
#[derive(Clone, Debug, PartialEq)]
pub struct PublicParams {
    pub p: BigUint,
    pub g: BigUint,
    pub y: BigUint,
}

impl PublicParams {
    /// Parse the three parameter lines sent at session start
    pub fn parse(p: &str, g: &str, y: &str) -> Result<Self, Error> {
        let p = parse_value(p)?;

        if p <= BigUint::from(2_u8) {
            return Err(Error::ProtocolViolation(format!("modulus {} is too small", p)));
        }

        Ok(Self {
            g: parse_value(g)?.mod_floor(&p),
            y: parse_value(y)?.mod_floor(&p),
            p,
        })
    }
}

/// Parse `value`, `name = value` or `name: value`, decimal or 0x-prefixed hex
pub fn parse_value(line: &str) -> Result<BigUint, Error> {
    let value = line
        .rsplit(|c: char| c == '=' || c == ':')
        .next()
        .unwrap_or(line)
        .trim();

    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(value.as_bytes(), 10),
    };

    parsed.ok_or_else(|| Error::MalformedLine(line.to_string()))
}

/// Challenge branch selected by the verifier for a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    /// Submit (w, C) with y*C = g^w mod p
    A,
    /// Submit (r, C) with g^r = C mod p
    B,
}

impl Branch {
    /// Parse a prompt line, the last token selects the branch
    pub fn parse(line: &str) -> Result<Self, Error> {
        let token = line
            .split(|c: char| c.is_whitespace() || c == ':')
            .filter(|t| !t.is_empty())
            .last()
            .unwrap_or("");

        match token.to_ascii_lowercase().as_str() {
            "a" | "0" => Ok(Branch::A),
            "b" | "1" => Ok(Branch::B),
            _ => Err(Error::MalformedLine(line.to_string())),
        }
    }
}

/// Response computed for one round
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub branch: Branch,
    /// w for branch A, r for branch B
    pub exponent: BigUint,
    pub correlation: BigUint,
}

impl Response {
    pub fn to_line(&self) -> String {
        format!("{} {}", self.exponent, self.correlation)
    }
}

/// Session state machine
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    AwaitingChallenge,
    ComputingResponse(Branch),
    Submitting(Response),
    RoundPassed,
    Failed,
    Completed(String),
}

/// Source of per-round correlation values
pub trait CorrelationSource {
    /// Draw a candidate in [1, p)
    ///
    /// Candidates that were already used, or whose target lies outside <g>, are
    /// discarded and drawn again
    fn draw(&mut self, p: &BigUint) -> BigUint;
}

/// Uniform correlation values from any random number generator
pub struct RandomCorrelation<R>(pub R);

impl<R: Rng> CorrelationSource for RandomCorrelation<R> {
    fn draw(&mut self, p: &BigUint) -> BigUint {
        self.0.gen_biguint_range(&BigUint::one(), p)
    }
}

/// Drives the multi-round discrete-log challenge/response protocol
pub struct Session<T, C> {
    transport: T,
    source: C,
    config: SessionConfig,
    params: PublicParams,
    group: Subgroup,
    used: HashSet<BigUint>,
    round: usize,
    state: SessionState,
}

impl<T: Transport, C: CorrelationSource> Session<T, C> {
    /// Read the public parameters and enter AwaitingChallenge
    pub fn start(mut transport: T, source: C, config: SessionConfig) -> Result<Self, Error> {
        let p = transport.recv_line()?;
        let g = transport.recv_line()?;
        let y = transport.recv_line()?;
        let params = PublicParams::parse(&p, &g, &y)?;

        let group = Subgroup::new(&params.g, &params.p, &config.dlog)?;

        debug!(p = %params.p, g = %params.g, y = %params.y, order = %group.order(), "session parameters");

        Ok(Self {
            transport,
            source,
            config,
            params,
            group,
            used: HashSet::new(),
            round: 0,
            state: SessionState::AwaitingChallenge,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Rounds passed so far
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn params(&self) -> &PublicParams {
        &self.params
    }

    /// Subgroup generated by g, factored once at session start
    pub fn group(&self) -> &Subgroup {
        &self.group
    }

    /// Every correlation value submitted this session
    pub fn used_correlations(&self) -> &HashSet<BigUint> {
        &self.used
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run rounds until the secret is revealed
    ///
    /// Any failure is terminal, later calls return `SessionFailed`
    pub fn run(&mut self) -> Result<String, Error> {
        loop {
            match &self.state {
                SessionState::Completed(secret) => return Ok(secret.clone()),
                SessionState::Failed => return Err(Error::SessionFailed),
                _ => (),
            }

            if let Err(e) = self.step() {
                warn!(round = self.round, error = %e, "session failed");
                self.state = SessionState::Failed;
                return Err(e);
            }
        }
    }

    /// Advance the state machine by one transition
    pub fn step(&mut self) -> Result<(), Error> {
        // a transition that errors leaves the session Failed
        let state = mem::replace(&mut self.state, SessionState::Failed);

        self.state = match state {
            SessionState::AwaitingChallenge => {
                if self.round >= self.config.rounds {
                    let secret = self.transport.recv_line()?;
                    info!(rounds = self.round, "session completed");
                    SessionState::Completed(secret)
                } else {
                    let branch = Branch::parse(&self.transport.recv_line()?)?;
                    debug!(round = self.round, ?branch, "challenge received");
                    SessionState::ComputingResponse(branch)
                }
            }
            SessionState::ComputingResponse(branch) => {
                SessionState::Submitting(self.respond(branch)?)
            }
            SessionState::Submitting(response) => {
                self.used.insert(response.correlation.clone());
                self.transport.send_line(&response.to_line())?;

                let verdict = self.transport.recv_line()?;
                if !verdict.trim().to_ascii_lowercase().starts_with("ok") {
                    return Err(Error::ProtocolViolation(verdict));
                }

                SessionState::RoundPassed
            }
            SessionState::RoundPassed => {
                self.round += 1;
                info!(round = self.round, "round passed");

                if let Some(pause) = self.config.pause {
                    if self.round < self.config.rounds {
                        thread::sleep(pause);
                    }
                }

                SessionState::AwaitingChallenge
            }
            SessionState::Completed(secret) => SessionState::Completed(secret),
            SessionState::Failed => return Err(Error::SessionFailed),
        };

        Ok(())
    }

    /// Compute the response for a branch with a fresh correlation value
    pub fn respond(&mut self, branch: Branch) -> Result<Response, Error> {
        let (correlation, target) = self.fresh_correlation(branch)?;
        let exponent = self.group.log(&target, self.config.dlog.step_limit)?;

        Ok(Response {
            branch,
            exponent,
            correlation,
        })
    }

    // draw until an unused value whose target has a log in <g> comes up
    fn fresh_correlation(&mut self, branch: Branch) -> Result<(BigUint, BigUint), Error> {
        let p = &self.params.p;

        for _ in 0..self.config.max_draws {
            let c = self.source.draw(p).mod_floor(p);

            if c.is_zero() || self.used.contains(&c) {
                continue;
            }

            let target = match branch {
                Branch::A => (&c * &self.params.y).mod_floor(p),
                Branch::B => c.clone(),
            };

            if self.group.contains(&target) {
                return Ok((c, target));
            }

            debug!(round = self.round, "correlation outside the generated subgroup");
        }

        Err(Error::CorrelationExhausted(self.config.max_draws))
    }
}
