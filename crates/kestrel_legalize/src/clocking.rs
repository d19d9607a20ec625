//! Legalization of clock buffers and clock-management blocks.
//!
//! Every global buffer variant is an under-configured `BUFGCTRL`: the
//! preparation sweep ties off the control inputs each variant leaves
//! implicit, absorbs select/enable inverters, and then retypes everything
//! through one rule table. Clock managers are upgraded from their `_BASE`
//! forms to the full `_ADV` primitives with explicit defaults.

use crate::xform::{generic_xform, xform_cell, XFormRule};
use crate::{LegalizeResult, Packer};
use kestrel_common::Ident;
use kestrel_diagnostics::Diagnostic;
use kestrel_netlist::Property;
use std::collections::HashMap;

impl Packer<'_, '_> {
    fn bufgctrl_rules(&self) -> HashMap<Ident, XFormRule> {
        let id = |s: &str| self.nl.id(s);
        let bufgctrl = id("BUFGCTRL");
        let mut rules = HashMap::new();
        rules.insert(
            id("BUFG"),
            XFormRule::retype(bufgctrl).port(id("I"), id("I0")),
        );
        let bufgce = XFormRule::retype(bufgctrl)
            .port(id("I"), id("I0"))
            .port(id("CE"), id("CE0"));
        rules.insert(id("BUFGCE"), bufgce.clone());
        rules.insert(id("BUFGCE_1"), bufgce);
        let bufgmux =
            XFormRule::retype(bufgctrl).multi_port(id("S"), vec![id("CE0"), id("CE1")]);
        rules.insert(id("BUFGMUX"), bufgmux.clone());
        rules.insert(id("BUFGMUX_1"), bufgmux);
        rules.insert(
            id("BUFGMUX_CTRL"),
            XFormRule::retype(bufgctrl).multi_port(id("S"), vec![id("S0"), id("S1")]),
        );
        rules
    }

    /// Normalizes every clock buffer variant onto `BUFGCTRL`/`BUFHCE` and
    /// upgrades `_BASE` clock managers to their `_ADV` forms.
    pub fn prepare_clocking(&mut self) -> LegalizeResult<()> {
        self.sink.emit(Diagnostic::info("preparing clocking"));
        let rules = self.bufgctrl_rules();
        for cell in self.nl.sorted_cells() {
            let ty = self.nl.cell(cell).ty;
            match self.nl.interner.resolve(ty) {
                "MMCME2_BASE" => {
                    let adv = self.nl.id("MMCME2_ADV");
                    self.nl.cell_mut(cell).ty = adv;
                }
                "PLLE2_BASE" => {
                    let adv = self.nl.id("PLLE2_ADV");
                    self.nl.cell_mut(cell).ty = adv;
                }
                "BUFG" => {
                    self.tie_port(cell, "CE0", true, true);
                    self.tie_port(cell, "S0", true, true);
                    self.tie_port(cell, "S1", false, true);
                    self.tie_port(cell, "IGNORE0", true, true);
                }
                "BUFGCE" | "BUFGCE_1" => {
                    self.fold_inverter(cell, "CE");
                    let old = self.nl.id("IS_CE_INVERTED");
                    if self.nl.cell(cell).bool_param_or(old, false) {
                        let new = self.nl.id("IS_CE0_INVERTED");
                        let params = &mut self.nl.cell_mut(cell).params;
                        params.remove(&old);
                        params.insert(new, Property::Int(1));
                    }
                    self.tie_port(cell, "S0", true, true);
                    self.tie_port(cell, "S1", false, true);
                    self.tie_port(cell, "IGNORE0", true, true);
                    self.tie_port(cell, "IGNORE1", false, true);
                }
                "BUFH" | "BUFHCE" => {
                    let bufhce = self.nl.id("BUFHCE");
                    self.nl.cell_mut(cell).ty = bufhce;
                    self.tie_port(cell, "CE", true, true);
                }
                "BUFGMUX" | "BUFGMUX_1" => {
                    self.fold_inverter(cell, "S");
                    let s_inv = self.nl.id("IS_S_INVERTED");
                    let ce0_inv = self.nl.id("IS_CE0_INVERTED");
                    let ce1_inv = self.nl.id("IS_CE1_INVERTED");
                    let inverted = self.nl.cell(cell).bool_param_or(s_inv, false);
                    {
                        let params = &mut self.nl.cell_mut(cell).params;
                        // The select net fans out to both enables; exactly one
                        // leg sees it inverted so the pair acts as a mux.
                        if inverted {
                            params.insert(ce0_inv, Property::Int(0));
                            params.insert(ce1_inv, Property::Int(1));
                            params.remove(&s_inv);
                        } else {
                            params.insert(ce0_inv, Property::Int(1));
                            params.insert(ce1_inv, Property::Int(0));
                        }
                    }
                    let sel_key = self.nl.id("CLK_SEL_TYPE");
                    let is_async =
                        self.nl.cell(cell).str_param_or(sel_key, "SYNC") == "ASYNC";
                    if is_async {
                        self.tie_port(cell, "S0", true, true);
                        self.tie_port(cell, "S1", true, true);
                        self.tie_port(cell, "IGNORE0", false, true);
                        self.tie_port(cell, "IGNORE1", false, true);
                    } else {
                        self.tie_port(cell, "S0", true, true);
                        self.tie_port(cell, "S1", true, true);
                        self.tie_port(cell, "IGNORE0", true, false);
                        self.tie_port(cell, "IGNORE1", true, false);
                    }
                }
                "BUFGMUX_CTRL" => {
                    self.fold_inverter(cell, "S");
                    let s_inv = self.nl.id("IS_S_INVERTED");
                    let s0_inv = self.nl.id("IS_S0_INVERTED");
                    let s1_inv = self.nl.id("IS_S1_INVERTED");
                    let inverted = self.nl.cell(cell).bool_param_or(s_inv, false);
                    {
                        let params = &mut self.nl.cell_mut(cell).params;
                        if inverted {
                            params.insert(s0_inv, Property::Int(0));
                            params.insert(s1_inv, Property::Int(1));
                            params.remove(&s_inv);
                        } else {
                            params.insert(s0_inv, Property::Int(1));
                            params.insert(s1_inv, Property::Int(0));
                        }
                    }
                    // Retype now so the enables are tied on the final ports.
                    xform_cell(self.nl, &rules, cell);
                    self.tie_port(cell, "CE0", true, true);
                    self.tie_port(cell, "CE1", true, true);
                    self.tie_port(cell, "IGNORE0", true, false);
                    self.tie_port(cell, "IGNORE1", true, false);
                }
                _ => {}
            }
        }
        generic_xform(self.nl, &rules);
        Ok(())
    }

    /// Fills in clock-manager defaults and rewires internal feedback.
    pub fn pack_plls(&mut self) -> LegalizeResult<()> {
        self.sink.emit(Diagnostic::info("packing PLLs"));
        for cell in self.nl.sorted_cells() {
            let ty = self.nl.cell(cell).ty;
            let is_mmcm = ty == self.nl.id("MMCME2_ADV");
            let is_pll = ty == self.nl.id("PLLE2_ADV");
            if !is_mmcm && !is_pll {
                continue;
            }
            self.hint_near(cell, "CLKIN1");
            for i in 1..=2 {
                self.default_param(cell, &format!("CLKIN{i}_PERIOD"), Property::from("0.0"));
            }
            let nouts = if is_mmcm { 7 } else { 6 };
            for i in 0..nouts {
                self.default_param(cell, &format!("CLKOUT{i}_DIVIDE"), Property::Int(1));
                self.default_param(cell, &format!("CLKOUT{i}_DUTY_CYCLE"), Property::from("0.5"));
                self.default_param(cell, &format!("CLKOUT{i}_PHASE"), Property::Int(0));
                if is_mmcm {
                    self.default_param(cell, &format!("CLKOUT{i}_CASCADE"), Property::from("FALSE"));
                    self.default_param(
                        cell,
                        &format!("CLKOUT{i}_USE_FINE_PS"),
                        Property::from("FALSE"),
                    );
                }
            }
            self.default_param(cell, "COMPENSATION", Property::from("INTERNAL"));
            let comp = self.nl.id("COMPENSATION");
            if self.nl.cell(cell).str_param_or(comp, "INTERNAL") == "INTERNAL" {
                // Feedback closes inside the block; the pin still needs a
                // defined level.
                let clkfbin = self.nl.id("CLKFBIN");
                self.nl.disconnect(cell, clkfbin);
                let vcc = self.nl.vcc();
                self.nl.connect_input(cell, "CLKFBIN", vcc);
            }
        }
        Ok(())
    }

    /// Records placement hints pulling buffers toward their clock sources.
    pub fn pack_gbs(&mut self) -> LegalizeResult<()> {
        self.sink.emit(Diagnostic::info("packing global buffers"));
        for cell in self.nl.sorted_cells() {
            let ty = self.nl.cell(cell).ty;
            if ty == self.nl.id("BUFGCTRL") {
                self.hint_near(cell, "I0");
            } else if ty == self.nl.id("BUFHCE") {
                self.hint_near(cell, "I");
            }
        }
        Ok(())
    }

    /// Runs the full clocking legalization: preparation, clock managers,
    /// then buffer placement hints.
    pub fn pack_clocking(&mut self) -> LegalizeResult<()> {
        self.prepare_clocking()?;
        self.pack_plls()?;
        self.pack_gbs()?;
        self.flush_cells();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{new_packer, TestCtx};
    use kestrel_netlist::{Netlist, Property};

    #[test]
    fn bufg_becomes_fully_tied_bufgctrl() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let clk_in = nl.add_net("clk_in");
        let clk_out = nl.add_net("clk");
        let buf = nl.add_cell("clkbuf", "BUFG");
        nl.connect_input(buf, "I", clk_in);
        nl.connect_output(buf, "O", clk_out);

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        let vcc = nl.vcc();
        assert_eq!(nl.cell(buf).ty, nl.id("BUFGCTRL"));
        assert_eq!(nl.port_net(buf, nl.id("I0")), Some(clk_in));
        assert_eq!(nl.port_net(buf, nl.id("CE0")), Some(vcc));
        assert_eq!(nl.port_net(buf, nl.id("S0")), Some(vcc));
        assert_eq!(nl.port_net(buf, nl.id("S1")), Some(vcc));
        assert_eq!(nl.port_net(buf, nl.id("IGNORE0")), Some(vcc));
        let params = &nl.cell(buf).params;
        assert!(!params.contains_key(&nl.id("IS_CE0_INVERTED")));
        assert!(!params.contains_key(&nl.id("IS_S0_INVERTED")));
        assert_eq!(params.get(&nl.id("IS_S1_INVERTED")), Some(&Property::Int(1)));
    }

    #[test]
    fn bufgce_folds_enable_inverter() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let ce_raw = nl.add_net("ce_raw");
        let ce_n = nl.add_net("ce_n");
        let inv = nl.add_cell("ce_inv", "INV");
        nl.connect_input(inv, "I", ce_raw);
        nl.connect_output(inv, "O", ce_n);
        let clk_in = nl.add_net("clk_in");
        let buf = nl.add_cell("gated_buf", "BUFGCE");
        nl.connect_input(buf, "I", clk_in);
        nl.connect_input(buf, "CE", ce_n);

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        assert_eq!(nl.cell(buf).ty, nl.id("BUFGCTRL"));
        assert_eq!(nl.port_net(buf, nl.id("CE0")), Some(ce_raw));
        let params = &nl.cell(buf).params;
        assert_eq!(
            params.get(&nl.id("IS_CE0_INVERTED")),
            Some(&Property::Int(1))
        );
        assert!(!params.contains_key(&nl.id("IS_CE_INVERTED")));
        assert!(nl.is_retired(inv));
    }

    #[test]
    fn bufgmux_select_fans_out_to_both_enables() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let sel = nl.add_net("sel");
        let mux = nl.add_cell("clkmux", "BUFGMUX");
        nl.connect_input(mux, "S", sel);

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        let vcc = nl.vcc();
        assert_eq!(nl.cell(mux).ty, nl.id("BUFGCTRL"));
        assert_eq!(nl.port_net(mux, nl.id("CE0")), Some(sel));
        assert_eq!(nl.port_net(mux, nl.id("CE1")), Some(sel));
        let params = &nl.cell(mux).params;
        assert_eq!(params.get(&nl.id("IS_CE0_INVERTED")), Some(&Property::Int(1)));
        assert_eq!(params.get(&nl.id("IS_CE1_INVERTED")), Some(&Property::Int(0)));
        // Synchronous select: ignores are real high ties, no inversion.
        assert_eq!(nl.port_net(mux, nl.id("IGNORE0")), Some(vcc));
        assert_eq!(nl.port_net(mux, nl.id("IGNORE1")), Some(vcc));
        assert!(!params.contains_key(&nl.id("IS_IGNORE0_INVERTED")));
    }

    #[test]
    fn bufgmux_async_inverts_ignores() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let mux = nl.add_cell("clkmux", "BUFGMUX");
        nl.cell_mut(mux)
            .params
            .insert(ctx.interner.id("CLK_SEL_TYPE"), Property::from("ASYNC"));

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        let params = &nl.cell(mux).params;
        assert_eq!(
            params.get(&nl.id("IS_IGNORE0_INVERTED")),
            Some(&Property::Int(1))
        );
        assert_eq!(
            params.get(&nl.id("IS_IGNORE1_INVERTED")),
            Some(&Property::Int(1))
        );
    }

    #[test]
    fn bufgmux_inverted_select_swaps_enables() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let mux = nl.add_cell("clkmux", "BUFGMUX");
        nl.cell_mut(mux)
            .params
            .insert(ctx.interner.id("IS_S_INVERTED"), Property::Int(1));

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        let params = &nl.cell(mux).params;
        assert_eq!(params.get(&nl.id("IS_CE0_INVERTED")), Some(&Property::Int(0)));
        assert_eq!(params.get(&nl.id("IS_CE1_INVERTED")), Some(&Property::Int(1)));
        assert!(!params.contains_key(&nl.id("IS_S_INVERTED")));
    }

    #[test]
    fn bufgmux_ctrl_splits_select_onto_selects() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let sel = nl.add_net("sel");
        let mux = nl.add_cell("clkmux", "BUFGMUX_CTRL");
        nl.connect_input(mux, "S", sel);

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        let vcc = nl.vcc();
        assert_eq!(nl.cell(mux).ty, nl.id("BUFGCTRL"));
        assert_eq!(nl.port_net(mux, nl.id("S0")), Some(sel));
        assert_eq!(nl.port_net(mux, nl.id("S1")), Some(sel));
        assert_eq!(nl.port_net(mux, nl.id("CE0")), Some(vcc));
        assert_eq!(nl.port_net(mux, nl.id("CE1")), Some(vcc));
        let params = &nl.cell(mux).params;
        assert_eq!(params.get(&nl.id("IS_S0_INVERTED")), Some(&Property::Int(1)));
        assert_eq!(params.get(&nl.id("IS_S1_INVERTED")), Some(&Property::Int(0)));
    }

    #[test]
    fn bufh_gains_tied_enable() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let buf = nl.add_cell("hbuf", "BUFH");
        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);
        assert_eq!(nl.cell(buf).ty, nl.id("BUFHCE"));
        assert_eq!(nl.port_net(buf, nl.id("CE")), Some(nl.vcc()));
    }

    #[test]
    fn mmcm_upgraded_with_defaults_and_internal_feedback() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let fb = nl.add_net("fb_loop");
        let mmcm = nl.add_cell("pll0", "MMCME2_BASE");
        nl.connect_input(mmcm, "CLKFBIN", fb);
        nl.cell_mut(mmcm)
            .params
            .insert(ctx.interner.id("CLKOUT2_DIVIDE"), Property::Int(8));

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);

        assert_eq!(nl.cell(mmcm).ty, nl.id("MMCME2_ADV"));
        let params = &nl.cell(mmcm).params;
        // User-provided values win over the filled defaults.
        assert_eq!(params.get(&nl.id("CLKOUT2_DIVIDE")), Some(&Property::Int(8)));
        assert_eq!(params.get(&nl.id("CLKOUT0_DIVIDE")), Some(&Property::Int(1)));
        assert_eq!(
            params.get(&nl.id("CLKOUT6_USE_FINE_PS")),
            Some(&Property::from("FALSE"))
        );
        assert_eq!(
            params.get(&nl.id("COMPENSATION")),
            Some(&Property::from("INTERNAL"))
        );
        assert_eq!(nl.port_net(mmcm, nl.id("CLKFBIN")), Some(nl.vcc()));
        assert!(nl.net(fb).users.is_empty());
    }

    #[test]
    fn pll_upgraded_without_mmcm_only_params() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let pll = nl.add_cell("pll0", "PLLE2_BASE");
        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);
        assert_eq!(nl.cell(pll).ty, nl.id("PLLE2_ADV"));
        let params = &nl.cell(pll).params;
        assert_eq!(params.get(&nl.id("CLKOUT5_DIVIDE")), Some(&Property::Int(1)));
        assert!(!params.contains_key(&nl.id("CLKOUT0_CASCADE")));
        assert!(!params.contains_key(&nl.id("CLKOUT6_DIVIDE")));
    }

    #[test]
    fn explicit_external_compensation_keeps_feedback() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let fb = nl.add_net("fb_loop");
        let mmcm = nl.add_cell("pll0", "MMCME2_ADV");
        nl.connect_input(mmcm, "CLKFBIN", fb);
        nl.cell_mut(mmcm)
            .params
            .insert(ctx.interner.id("COMPENSATION"), Property::from("EXTERNAL"));

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);
        assert_eq!(nl.port_net(mmcm, nl.id("CLKFBIN")), Some(fb));
    }

    #[test]
    fn buffers_hinted_toward_clock_source() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let clk = nl.add_net("mmcm_clk0");
        let mmcm = nl.add_cell("pll0", "MMCME2_ADV");
        nl.connect_output(mmcm, "CLKOUT0", clk);
        let buf = nl.add_cell("clkbuf", "BUFG");
        nl.connect_input(buf, "I", clk);

        let mut p = new_packer(&mut nl, &ctx);
        p.pack_clocking().unwrap();
        drop(p);
        assert_eq!(
            nl.cell(buf).attrs.get(&nl.id("PLACE_NEAR")),
            Some(&Property::from("pll0"))
        );
    }
}
