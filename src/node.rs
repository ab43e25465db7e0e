//! One reporting cycle of the sensor node
//!
//! Polls the adaptive controller and, when a report is due, takes the line
//! readings, packs them into a [`Packet`] and pushes it through the radio,
//! waking it just for the transmission.

use core::future::Future;

use crate::adaptive::{AdaptiveTx, AdcSource, Clock, EnergyLevel, NoAdc};
use crate::codec::Packet;
use crate::radio::{RadioError, RadioTransport};

/// Line readings taken for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Line voltage, volts
    pub line_voltage_v: f32,
    /// Line current, milliamps
    pub line_current_ma: i16,
    /// Seconds since boot, or epoch seconds when a time source exists
    pub timestamp: u32,
}

/// What a call to [`ReportCycle::run_once`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Battery below cutoff, nothing sent
    Cutoff,
    /// Next report not due yet
    NotDue,
    /// Packet transmitted
    Sent { level: EnergyLevel, period_ms: u32 },
}

/// Controller, radio and node identity bundled into one control loop step
pub struct ReportCycle<R, C, A = NoAdc> {
    radio: R,
    tx: AdaptiveTx<C, A>,
    node_id: u16,
    sent: u32,
}

impl<R, C, A> ReportCycle<R, C, A>
where
    R: RadioTransport,
    C: Clock,
    A: AdcSource,
{
    pub fn new(radio: R, tx: AdaptiveTx<C, A>, node_id: u16) -> Self {
        Self {
            radio,
            tx,
            node_id,
            sent: 0,
        }
    }

    /// Poll the controller and transmit if due.
    ///
    /// `measure` is awaited only once a report has been granted. Otherwise it
    /// is dropped unpolled, so sensors stay unpowered through cutoff and
    /// between deadlines. The radio is put back to sleep even when the send
    /// fails. The first radio error is returned.
    pub async fn run_once<M>(&mut self, measure: M) -> Result<CycleOutcome, RadioError>
    where
        M: Future<Output = Measurement>,
    {
        if !self.tx.tick() {
            return Ok(if self.tx.is_cutoff() {
                CycleOutcome::Cutoff
            } else {
                CycleOutcome::NotDue
            });
        }

        let measurement = measure.await;
        let packet = Packet::from_measurements(
            self.node_id,
            measurement.line_voltage_v,
            measurement.line_current_ma,
            self.tx.last_volts(),
            measurement.timestamp,
        );

        let sent = match self.radio.wake().await {
            Ok(()) => self.radio.send(&packet.encode()).await,
            Err(e) => Err(e),
        };
        let slept = self.radio.sleep().await;

        if let Err(e) = sent {
            log::warn!("node: report {} failed: {:?}", self.sent, e);
            return Err(e);
        }
        slept?;

        self.sent = self.sent.wrapping_add(1);
        let level = self.tx.level();
        let period_ms = self.tx.current_period();
        log::info!(
            "node: sent report {} at {} V, level {:?}, next in {} ms",
            self.sent,
            self.tx.last_volts(),
            level,
            period_ms
        );
        Ok(CycleOutcome::Sent { level, period_ms })
    }

    /// Milliseconds until the controller will grant the next report
    pub fn ms_until_next(&self) -> u32 {
        self.tx.ms_until_due()
    }

    /// Reports transmitted successfully
    pub fn packets_sent(&self) -> u32 {
        self.sent
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    pub fn controller(&self) -> &AdaptiveTx<C, A> {
        &self.tx
    }

    pub fn controller_mut(&mut self) -> &mut AdaptiveTx<C, A> {
        &mut self.tx
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}
