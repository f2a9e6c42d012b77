/*!
The probe sequence.

This replays the register accesses the vendor firmware performs for a single
aes operation and dumps the register window between the stages.
*/

use crate::buffers::ProbeBuffers;
use crate::config::ProbeConfig;
use crate::dry_run::FoldedPagemap;
use crate::regs;

use std::fmt;
use std::io;

use log::{info, warn};

use memprobe::prelude::v1::*;

/// What was observed during a run.
#[derive(Clone, Debug)]
pub struct ProbeReport {
    pub input_phys: PhysicalAddress,
    pub output_phys: PhysicalAddress,
    /// Value read back from KEY_TYPE after writing it.
    pub key_type: u32,
    /// STATUS value that ended the wait.
    pub status: u32,
    pub prepared: Vec<(Address, u32)>,
    pub armed: Vec<(Address, u32)>,
    pub finished: Vec<(Address, u32)>,
    /// Contents of the output buffer after the operation.
    pub output: Vec<u8>,
}

/// Drives the engine through one operation, writing diagnostics to `out`.
pub struct Probe<'a, W> {
    config: &'a ProbeConfig,
    out: W,
}

impl<'a, W: io::Write> Probe<'a, W> {
    pub fn new(config: &'a ProbeConfig, out: W) -> Self {
        Self { config, out }
    }

    /// Runs the full sequence against an open window.
    ///
    /// The physical addresses of the buffers are resolved right before they are programmed.
    /// Every STATUS value read while waiting for the engine is written to the sink.
    /// Nothing is undone on failure, the engine is left in whatever state it reached.
    pub fn run<S: PagemapSource>(
        &mut self,
        window: &mut RegisterWindow,
        buffers: &ProbeBuffers,
        translator: &mut AddressTranslator<S>,
    ) -> Result<ProbeReport> {
        let config = self.config;
        let base = window.base();
        let len = buffers.len() as u32;

        let output_phys = translator.translate_labeled("out_buf", buffers.output_addr())?;
        let input_phys = translator.translate_labeled("in_buf", buffers.input_addr())?;
        let output_reg = dma_address(output_phys)?;
        let input_reg = dma_address(input_phys)?;

        self.emit(format_args!("Prior to preparation:\n"))?;
        window.write32(base + regs::UNUSED_1, 0)?;
        let prepared = self.dump(window)?;

        window.write32(base + regs::OPERATION, config.operation)?;
        window.write32(base + regs::KEY_TYPE, config.key_type)?;
        let key_type = window.read32(base + regs::KEY_TYPE)?;
        self.emit(format_args!("Key type: {}\n", RegisterBits(key_type)))?;
        window.write32(base + regs::KEY_TYPE_AGAIN, !key_type)?;

        window.write32(base + regs::CONTROL, 1)?;
        window.write32(base + regs::KEY_CONTROL, config.key_control.to_word())?;

        window.write32(base + regs::OUT_SIZE, len)?;
        window.write32(base + regs::OUT_ADDRESS, output_reg)?;
        window.write32(base + regs::IN_SIZE, len)?;
        window.write32(base + regs::IN_ADDRESS, input_reg)?;
        window.write32(base + regs::AUX_SIZE, len)?;
        window.write32(base + regs::AUX_ADDRESS, input_reg)?;
        window.write32(base + regs::ADDITIONAL_SIZE, len)?;

        for (offset, word) in config.key_registers() {
            window.write32(base + offset, word)?;
        }
        for (n, word) in config.iv.iter().enumerate() {
            window.write32(base + regs::iv(n), *word)?;
        }

        let verb = if config.key_control.encrypt {
            "encrypt"
        } else {
            "decrypt"
        };
        self.emit(format_args!("About to {}...\n", verb))?;
        let armed = self.dump(window)?;

        window.write32(base + regs::STATUS, config.status_start)?;
        window.write32(base + regs::GO, 1)?;
        let status = {
            let out = &mut self.out;
            let window = &*window;
            poll_until(
                &config.poll,
                || {
                    let status = window.read32(base + regs::STATUS)?;
                    emit(out, format_args!("Current status: {}\n", RegisterBits(status)))?;
                    Ok(status)
                },
                |status| status & regs::STATUS_BUSY == 0,
            )?
        };

        std::thread::sleep(std::time::Duration::from_micros(config.settle_us));
        window.write32(base + regs::CONTROL, 0)?;

        self.emit(format_args!("Finished {}ing!\n", verb))?;
        let finished = self.dump(window)?;

        self.emit(format_args!(
            "{}{}",
            hex_dump(Some("input buf"), buffers.input(), HEX_DUMP_PER_LINE),
            hex_dump(Some("output buf"), buffers.output(), HEX_DUMP_PER_LINE)
        ))?;

        Ok(ProbeReport {
            input_phys,
            output_phys,
            key_type,
            status,
            prepared,
            armed,
            finished,
            output: buffers.output().to_vec(),
        })
    }

    fn dump(&mut self, window: &RegisterWindow) -> Result<Vec<(Address, u32)>> {
        let regs = window.dump(self.config.dump_len)?;
        self.emit(format_args!("Dumping:\n{}", WindowDump(&regs)))?;
        Ok(regs)
    }

    fn emit(&mut self, args: fmt::Arguments) -> Result<()> {
        emit(&mut self.out, args)
    }
}

fn emit<W: io::Write>(out: &mut W, args: fmt::Arguments) -> Result<()> {
    out.write_fmt(args)
        .map_err(|err| Error(ErrorOrigin::Other, ErrorKind::UnableToWriteFile).log_error(err))
}

/// Registers whose value differs between two dumps of the same range, as `(address, before, after)`.
pub fn changes<'a>(
    before: &'a [(Address, u32)],
    after: &'a [(Address, u32)],
) -> impl Iterator<Item = (Address, u32, u32)> + 'a {
    before
        .iter()
        .zip(after.iter())
        .filter(|((addr, old), (other, new))| addr == other && old != new)
        .map(|((addr, old), (_, new))| (*addr, *old, *new))
}

/// The engine takes 32-bit bus addresses.
fn dma_address(phys: PhysicalAddress) -> Result<u32> {
    u32::try_from(phys.to_umem()).map_err(|_| {
        Error(ErrorOrigin::Other, ErrorKind::OutOfRangeAccess)
            .log_error(format!("{} is not reachable with a 32-bit address", phys))
    })
}

/// Sets up the window, the buffers and the translator described by `config` and runs the probe.
///
/// A dry run maps anonymous memory in place of the device and uses a synthetic pagemap,
/// so it needs no privileges. Everything is released before this returns.
pub fn execute<W: io::Write>(config: &ProbeConfig, out: W) -> Result<ProbeReport> {
    let buffers = ProbeBuffers::new(config.message.as_bytes(), config.buffer_len)?;
    let mut probe = Probe::new(config, out);

    if config.dry_run {
        warn!("dry run, no hardware is touched");
        let mut window = RegisterWindow::anonymous(config.base, config.window_size)?;
        let page_size = page_size();
        let mut translator =
            AddressTranslator::with_source(FoldedPagemap::new(page_size), page_size);
        probe.run(&mut window, &buffers, &mut translator)
    } else {
        info!(
            "probing {} bytes at {} through {}",
            config.window_size,
            config.base,
            config.device.display()
        );
        let mut window = RegisterWindow::open_path(&config.device, config.base, config.window_size)?;
        let mut translator = AddressTranslator::open()?;
        probe.run(&mut window, &buffers, &mut translator)
    }
}

#[cfg(test)]
mod tests;
