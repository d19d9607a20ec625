//! Legalization of gigabit transceivers.
//!
//! Transceivers live in dedicated quads, so this pass does no structural
//! rewriting; it pins cells to the sites their pads imply and validates the
//! clock plumbing the hardware hardwires. Reference clocks reach a quad's
//! shared PLL (`GTPE2_COMMON`/`GTXE2_COMMON`) only through dedicated
//! `IBUFDS_GTE2` buffers, and the per-lane channels take their PLL clocks
//! over fixed intra-quad routes that never appear in the routed design.

use crate::xform::strip_brackets;
use crate::{LegalizeError, LegalizeResult, Packer};
use kestrel_diagnostics::Diagnostic;
use kestrel_netlist::{CellId, Property};

/// Channel clock inputs with a dedicated inverter BEL.
const CHANNEL_INVERTIBLE_CLOCKS: &[&str] = &[
    "CLKRSVD0",
    "CLKRSVD1",
    "CPLLLOCKDETCLK",
    "DMONITORCLK",
    "DRPCLK",
    "GTGREFCLK",
    "PMASCANCLK0",
    "PMASCANCLK1",
    "PMASCANCLK2",
    "PMASCANCLK3",
    "QPLLLOCKDETCLK",
    "RXUSRCLK",
    "RXUSRCLK2",
    "SCANCLK",
    "SIGVALIDCLK",
    "TSTCLK0",
    "TSTCLK1",
    "TXPHDLYTSTCLK",
    "TXUSRCLK",
    "TXUSRCLK2",
];

impl Packer<'_, '_> {
    /// Returns the transceiver site sharing a tile with the pad named by
    /// `io_bel` (a `SITE/BEL` string).
    pub(crate) fn gt_site_for(&self, io_bel: &str) -> LegalizeResult<String> {
        let pad_site = io_bel.split('/').next().unwrap_or(io_bel);
        let tile = self.geom.tile_of_site(pad_site).ok_or_else(|| {
            LegalizeError::config(format!("pad site '{pad_site}' not found in device geometry"))
        })?;
        for site in &tile.sites {
            if site.name.starts_with("GTP") || site.name.starts_with("GTX") {
                return Ok(site.name.clone());
            }
        }
        Err(LegalizeError::config(format!(
            "failed to find GTP/GTX site for {io_bel}"
        )))
    }

    /// Pins a reference clock buffer to the `IBUFDS_GTE2` site its pad
    /// implies.
    ///
    /// Each common tile carries four input pads feeding two buffers, one
    /// pad pair per buffer. The buffer's relative position within the tile
    /// is recorded as `_REL_BUF_Y`, which later decides which hardwired
    /// `GTREFCLK` input the buffer reaches.
    pub(crate) fn place_refclk_buffer(&mut self, buf: CellId, io_bel: &str) -> LegalizeResult<()> {
        let geom = self.geom;
        let pad_site = io_bel.split('/').next().unwrap_or(io_bel);
        let tile = geom.tile_of_site(pad_site).ok_or_else(|| {
            LegalizeError::config(format!("pad site '{pad_site}' not found in device geometry"))
        })?;

        let mut min_buf_y = i32::MAX;
        let mut min_pad_y = i32::MAX;
        let mut max_pad_y = i32::MIN;
        let mut pad_y = None;
        for site in &tile.sites {
            if site.name.starts_with("IPAD_") {
                min_pad_y = min_pad_y.min(site.y);
                max_pad_y = max_pad_y.max(site.y);
                if site.name == pad_site {
                    pad_y = Some(site.y);
                }
            }
            if site.name.starts_with("IBUFDS_GTE2_") {
                min_buf_y = min_buf_y.min(site.y);
            }
        }
        let Some(pad_y) = pad_y else {
            return Err(LegalizeError::config(format!(
                "failed to find IBUFDS_GTE2 site for {io_bel}"
            )));
        };
        if min_buf_y == i32::MAX {
            return Err(LegalizeError::config(format!(
                "tile '{}' carries no IBUFDS_GTE2 sites",
                tile.name
            )));
        }
        let num_pads = max_pad_y - min_pad_y + 1;
        if num_pads != 4 {
            return Err(LegalizeError::config(format!(
                "tile '{}' should carry exactly four reference clock input pads, found {num_pads}",
                tile.name
            )));
        }

        let rel_buf_y = (pad_y - min_pad_y) >> 1;
        let buf_y = min_buf_y + rel_buf_y;
        let buf_bel = format!("IBUFDS_GTE2_X0Y{buf_y}/IBUFDS_GTE2");

        let bel_key = self.nl.id("BEL");
        if let Some(existing) = self.nl.cell(buf).attrs.get(&bel_key) {
            let existing = existing.as_str().unwrap_or_default();
            if existing != buf_bel {
                return Err(LegalizeError::config(format!(
                    "location of IBUFDS_GTE2 '{}' on {buf_bel} conflicts with previous placement on {existing}",
                    self.nl.cell_name(buf)
                )));
            }
            return Ok(());
        }
        self.nl
            .cell_mut(buf)
            .attrs
            .insert(bel_key, Property::Str(buf_bel.clone()));
        let rel_key = self.nl.id("_REL_BUF_Y");
        self.nl
            .cell_mut(buf)
            .attrs
            .insert(rel_key, Property::Int(rel_buf_y as i64));
        self.sink.emit(
            Diagnostic::info("constraining reference clock buffer")
                .with_cell(self.nl.cell_name(buf))
                .with_site(buf_bel)
                .with_tile(&tile.name),
        );
        Ok(())
    }

    /// Pins a transceiver cell to the site sharing a tile with its placed
    /// pad.
    pub(crate) fn constrain_gt(&mut self, pad: CellId, gt: CellId) -> LegalizeResult<()> {
        let bel_key = self.nl.id("BEL");
        let Some(pad_bel) = self
            .nl
            .cell(pad)
            .attrs
            .get(&bel_key)
            .and_then(|p| p.as_str())
            .map(str::to_string)
        else {
            return Err(LegalizeError::config(format!(
                "pad cell '{}' has not been placed",
                self.nl.cell_name(pad)
            )));
        };
        let gt_site = self.gt_site_for(&pad_bel)?;
        let gt_type = self.nl.interner.resolve(self.nl.cell(gt).ty);
        let gt_bel = format!("{gt_site}/{gt_type}");

        if let Some(existing) = self.nl.cell(gt).attrs.get(&bel_key) {
            if existing.as_str() != Some(gt_bel.as_str()) {
                return Err(LegalizeError::config(format!(
                    "location of pad '{}' on {pad_bel} conflicts with previous placement of '{}' on {gt_site}",
                    self.nl.cell_name(pad),
                    self.nl.cell_name(gt)
                )));
            }
            return Ok(());
        }
        self.nl
            .cell_mut(gt)
            .attrs
            .insert(bel_key, Property::Str(gt_bel));
        let tile = self
            .geom
            .tile_of_site(&gt_site)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        self.sink.emit(
            Diagnostic::info("constraining transceiver")
                .with_cell(self.nl.cell_name(gt))
                .with_site(gt_site)
                .with_tile(tile),
        );
        Ok(())
    }

    /// Legalizes one quad-shared PLL cell.
    ///
    /// Reference clocks arriving through placed `IBUFDS_GTE2` buffers are
    /// hardwired, so their ports are disconnected and replaced by the
    /// `_GTREFCLK{0,1}_USED` configuration the buffer position selects. A
    /// fabric clock is tolerated only from a `BUFGCTRL`, rerouted onto the
    /// internal reference input.
    fn pack_gt_common(&mut self, cell: CellId, is_gtp: bool) -> LegalizeResult<()> {
        let interner = self.nl.interner;
        let gt_type = if is_gtp { "GTP" } else { "GTX" };

        self.fold_inverter(cell, "DRPCLK");
        if is_gtp {
            self.fold_inverter(cell, "PLL0LOCKDETCLK");
            self.fold_inverter(cell, "PLL1LOCKDETCLK");
        } else {
            self.fold_inverter(cell, "QPLLLOCKDETCLK");
        }

        let refclk0_key = self.nl.id("_GTREFCLK0_USED");
        let refclk1_key = self.nl.id("_GTREFCLK1_USED");
        let mut refclk0_used = false;
        let mut refclk1_used = false;

        for port in self.nl.sorted_port_names(cell) {
            let port_name = interner.resolve(port);
            let net = self.nl.port_net(cell, port);
            let used = net.is_some_and(|n| !self.nl.is_constant(n));

            if port_name == "DRPCLK" {
                let key = self.nl.id("_DRPCLK_USED");
                self.nl
                    .cell_mut(cell)
                    .params
                    .insert(key, Property::Bool(used));
            } else if port_name.starts_with("GTREFCLK") {
                let Some(net) = net.filter(|_| used) else {
                    // Tied or dangling reference input; record it unused.
                    let key = if port_name.ends_with('0') {
                        refclk0_key
                    } else {
                        refclk1_key
                    };
                    self.nl
                        .cell_mut(cell)
                        .params
                        .insert(key, Property::Bool(false));
                    continue;
                };
                let Some(driver) = self.nl.net_driver_cell(net) else {
                    return Err(LegalizeError::config(format!(
                        "port {port_name} of '{}' is connected to an undriven net",
                        self.nl.cell_name(cell)
                    )));
                };
                let driver_type = interner.resolve(self.nl.cell(driver).ty);
                if driver_type == "IBUFDS_GTE2" {
                    self.sink.emit(
                        Diagnostic::info(format!(
                            "reference clock comes from dedicated buffer '{}'",
                            self.nl.cell_name(driver)
                        ))
                        .with_cell(self.nl.cell_name(cell)),
                    );
                    let rel_key = self.nl.id("_REL_BUF_Y");
                    let rel = self
                        .nl
                        .cell(driver)
                        .attrs
                        .get(&rel_key)
                        .and_then(|p| p.as_int())
                        .unwrap_or(0);
                    // GTREFCLK0 is hardwired to the lower buffer and
                    // GTREFCLK1 to the upper one; the used flag activates
                    // the input, so the net needs no routing.
                    self.nl.disconnect(cell, port);
                    if rel == 1 {
                        refclk1_used = true;
                        self.nl
                            .cell_mut(cell)
                            .params
                            .insert(refclk1_key, Property::Int(1));
                    } else {
                        refclk0_used = true;
                        self.nl
                            .cell_mut(cell)
                            .params
                            .insert(refclk0_key, Property::Int(1));
                    }
                } else {
                    self.sink.emit(
                        Diagnostic::warning(format!(
                            "driver '{}' of the {gt_type} reference clock is not an IBUFDS_GTE2 buffer but a {driver_type}",
                            self.nl.cell_name(driver)
                        ))
                        .with_cell(self.nl.cell_name(cell)),
                    );
                    if driver_type != "BUFGCTRL" {
                        return Err(LegalizeError::config(format!(
                            "reference clock of '{}' driven by unsupported cell type {driver_type}",
                            self.nl.cell_name(cell)
                        )));
                    }
                    self.sink.emit(
                        Diagnostic::warning(
                            "fabric reference clock is not recommended; rerouting to the internal reference input",
                        )
                        .with_cell(self.nl.cell_name(cell)),
                    );
                    // The internal reference always enters through the
                    // first fabric clock input, whichever port the design
                    // used.
                    let gtg_port = if is_gtp { "GTGREFCLK0" } else { "GTGREFCLK" };
                    let target = self.nl.id(gtg_port);
                    self.nl.rename_port(cell, port, target);
                    let key = self.nl.id("_GTGREFCLK_USED");
                    self.nl
                        .cell_mut(cell)
                        .params
                        .insert(key, Property::Int(1));
                }
            }
        }
        let both_key = self.nl.id("_BOTH_GTREFCLK_USED");
        self.nl
            .cell_mut(cell)
            .params
            .insert(both_key, Property::Bool(refclk0_used && refclk1_used));
        Ok(())
    }

    /// Legalizes one transceiver channel.
    ///
    /// PLL clock inputs only ever come over hardwired intra-quad routes from
    /// the matching `*_COMMON` cell, so they are validated and disconnected.
    /// Bus ports are flattened to the scalar names the placed cell uses.
    fn pack_gt_channel(&mut self, cell: CellId, common_type: &str) -> LegalizeResult<()> {
        let interner = self.nl.interner;
        for clock in CHANNEL_INVERTIBLE_CLOCKS {
            self.fold_inverter(cell, clock);
        }

        for port in self.nl.sorted_port_names(cell) {
            let port_name = interner.resolve(port);
            if port_name.starts_with("PLL") && port_name.ends_with("CLK") {
                if let Some(net) = self.nl.port_net(cell, port) {
                    if self.nl.is_constant(net) {
                        // Tied PLL clocks are simply dropped.
                        self.nl.disconnect(cell, port);
                        continue;
                    }
                    let Some(driver) = self.nl.net(net).driver else {
                        return Err(LegalizeError::config(format!(
                            "clock input {port_name} of '{}' is connected to an undriven net",
                            self.nl.cell_name(cell)
                        )));
                    };
                    let driver_type = interner.resolve(self.nl.cell(driver.cell).ty);
                    if driver_type != common_type {
                        return Err(LegalizeError::config(format!(
                            "the clock inputs of '{}' can only be driven by the clock outputs of a {common_type} instance, not a {driver_type}",
                            self.nl.cell_name(cell)
                        )));
                    }
                    let driver_port = interner.resolve(driver.port);
                    let prefix = &port_name[..4];
                    let suffix = &port_name[4..];
                    if !driver_port.starts_with(prefix) || !driver_port.ends_with(suffix) {
                        return Err(LegalizeError::config(format!(
                            "port {port_name} of '{}' can only be connected to port {prefix}OUT{suffix} of a {common_type} instance, not to {driver_port}",
                            self.nl.cell_name(cell)
                        )));
                    }
                    // Hardwired within the quad.
                    self.nl.disconnect(cell, port);
                }
            }
            if let Some(stripped) = strip_brackets(port_name) {
                let target = self.nl.id(&stripped);
                self.nl.rename_port(cell, port, target);
            }
        }
        Ok(())
    }

    /// Legalizes all gigabit transceiver cells.
    pub fn pack_gt(&mut self) -> LegalizeResult<()> {
        self.sink
            .emit(Diagnostic::info("packing gigabit transceivers"));
        let interner = self.nl.interner;
        let bel_key = self.nl.id("BEL");

        // Pin reference clock buffers next to the placed pads feeding them.
        for cell in self.nl.sorted_cells() {
            if interner.resolve(self.nl.cell(cell).ty) != "IBUFDS_GTE2" {
                continue;
            }
            let Some(net) = self.nl.port_net(cell, self.nl.id("I")) else {
                continue;
            };
            let Some(pad) = self.nl.net_driver_cell(net) else {
                continue;
            };
            let Some(io_bel) = self
                .nl
                .cell(pad)
                .attrs
                .get(&bel_key)
                .and_then(|p| p.as_str())
                .map(str::to_string)
            else {
                continue;
            };
            self.place_refclk_buffer(cell, &io_bel)?;
        }

        // Pin channels next to their receive pads.
        for cell in self.nl.sorted_cells() {
            let rx_port = match interner.resolve(self.nl.cell(cell).ty) {
                "GTPE2_CHANNEL" => "GTPRXP",
                "GTXE2_CHANNEL" => "GTXRXP",
                _ => continue,
            };
            let Some(net) = self.nl.port_net(cell, self.nl.id(rx_port)) else {
                continue;
            };
            let Some(pad) = self.nl.net_driver_cell(net) else {
                continue;
            };
            self.constrain_gt(pad, cell)?;
        }

        for cell in self.nl.sorted_cells() {
            match interner.resolve(self.nl.cell(cell).ty) {
                "GTPE2_COMMON" => self.pack_gt_common(cell, true)?,
                "GTXE2_COMMON" => self.pack_gt_common(cell, false)?,
                "GTPE2_CHANNEL" => self.pack_gt_channel(cell, "GTPE2_COMMON")?,
                "GTXE2_CHANNEL" => self.pack_gt_channel(cell, "GTXE2_COMMON")?,
                _ => {}
            }
        }
        self.flush_cells();
        Ok(())
    }
}
