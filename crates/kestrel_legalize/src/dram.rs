//! Packing of LUT-based distributed memories.
//!
//! Every distributed-memory primitive decomposes into 64-entry (or paired
//! 32-entry) LUT read ports sharing one write port. Primitives that agree on
//! their write controls are stacked into the same slice cluster, top slot
//! first, with the topmost LUT carrying the write address for the whole
//! cluster. Memories deeper than 64 entries read out through a
//! [`create_muxf_tree`](Packer::create_muxf_tree) selection tree.

use crate::xform::{xform_cell, XFormRule};
use crate::{LegalizeResult, Packer};
use kestrel_arch::bels::{slot_z, BEL_5LUT, BEL_6LUT};
use kestrel_common::{BitVec, Ident, InternalError};
use kestrel_diagnostics::Diagnostic;
use kestrel_netlist::{CellId, NetId, Property};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// The write-port signals shared by every LUT in one slice cluster.
///
/// Two memory cells may share a cluster only when this whole set matches,
/// including the memory type itself.
#[derive(Clone, PartialEq, Eq, Hash)]
struct DramControlSet {
    wa: Vec<Option<NetId>>,
    wclk: Option<NetId>,
    we: Option<NetId>,
    wclk_inv: bool,
    memtype: Ident,
}

/// Shape of one distributed-memory primitive type.
#[derive(Clone, Copy)]
struct DramType {
    abits: u32,
    dbits: u32,
    rports: u32,
}

fn swap_init_bit(init: &mut BitVec, bit: u32) {
    let mask = 1u32 << bit;
    for j in 0..init.width() {
        if j & mask != 0 {
            continue;
        }
        let k = j | mask;
        if k >= init.width() {
            continue;
        }
        let low = init.get(j);
        let high = init.get(k);
        init.set(j, high);
        init.set(k, low);
    }
}

impl Packer<'_, '_> {
    fn dram_type_table(&self) -> HashMap<Ident, DramType> {
        let mut types = HashMap::new();
        let mut add = |name: &str, abits: u32, dbits: u32, rports: u32| {
            types.insert(
                self.nl.id(name),
                DramType {
                    abits,
                    dbits,
                    rports,
                },
            );
        };
        add("RAM32X1S", 5, 1, 0);
        add("RAM32X1S_1", 5, 1, 0);
        add("RAM32X2S", 5, 2, 0);
        add("RAM32X1D", 5, 1, 1);
        add("RAM64X1S", 6, 1, 0);
        add("RAM64X1S_1", 6, 1, 0);
        add("RAM64X1D", 6, 1, 1);
        add("RAM128X1S", 7, 1, 0);
        add("RAM128X1D", 7, 1, 1);
        add("RAM256X1S", 8, 1, 0);
        types
    }

    fn setup_dram_rules(&mut self) {
        let interner = self.nl.interner;
        let id = |s: &str| interner.id(s);
        let slice_lutx = id("SLICE_LUTX");

        let mut r64 = XFormRule::retype(slice_lutx)
            .attr(id("X_LUT_AS_DRAM"), Property::Int(1))
            .attr(id("X_IS_SLICEM"), Property::Int(1));
        for i in 0..6 {
            r64 = r64.port(id(&format!("RADR{i}")), id(&format!("A{}", i + 1)));
        }
        for i in 0..8 {
            r64 = r64.port(id(&format!("WADR{i}")), id(&format!("WA{}", i + 1)));
        }
        r64 = r64.port(id("I"), id("DI1")).port(id("O"), id("O6"));
        self.dram_rules.clear();
        self.dram_rules.insert(id("RAMD64E"), r64);

        let mut r32 = XFormRule::retype(slice_lutx).attr(id("X_LUT_AS_DRAM"), Property::Int(1));
        for i in 0..5 {
            r32 = r32
                .port(id(&format!("RADR{i}")), id(&format!("A{}", i + 1)))
                .port(id(&format!("WADR{i}")), id(&format!("WA{}", i + 1)));
        }
        r32 = r32.port(id("I"), id("DI1"));
        let r32_6 = r32.clone().port(id("O"), id("O6"));
        let r32_5 = r32.port(id("O"), id("O5"));
        self.dram32_6_rules.clear();
        self.dram32_6_rules.insert(id("RAMD32"), r32_6);
        self.dram32_5_rules.clear();
        self.dram32_5_rules.insert(id("RAMD32"), r32_5);
    }

    /// Creates one 64-entry LUT read port, already legalized to `SLICE_LUTX`
    /// and constrained to absolute slot `z` of its cluster.
    fn create_dram_lut(
        &mut self,
        name: &str,
        base: Option<CellId>,
        cs: &DramControlSet,
        address: &[Option<NetId>],
        di: Option<NetId>,
        dout: Option<NetId>,
        z: i32,
    ) -> CellId {
        let lut = self.nl.add_pending_cell(name, "RAMD64E");
        for (i, a) in address.iter().enumerate() {
            if let Some(a) = *a {
                self.nl.connect_input(lut, &format!("RADR{i}"), a);
            }
        }
        if let Some(di) = di {
            self.nl.connect_input(lut, "I", di);
        }
        if let Some(dout) = dout {
            self.nl.connect_output(lut, "O", dout);
        }
        if let Some(wclk) = cs.wclk {
            self.nl.connect_input(lut, "CLK", wclk);
        }
        if let Some(we) = cs.we {
            self.nl.connect_input(lut, "WE", we);
        }
        for (i, a) in cs.wa.iter().enumerate() {
            if let Some(a) = *a {
                self.nl.connect_input(lut, &format!("WADR{i}"), a);
            }
        }
        let inv_key = self.nl.id("IS_WCLK_INVERTED");
        self.nl
            .cell_mut(lut)
            .params
            .insert(inv_key, Property::Int(cs.wclk_inv as i64));
        xform_cell(self.nl, &self.dram_rules, lut);

        let constr = &mut self.nl.cell_mut(lut).constr;
        constr.abs_z = true;
        constr.z = Some(slot_z(z, BEL_6LUT));
        if let Some(base) = base {
            self.nl.cell_mut(lut).constr.parent = Some(base);
            self.nl.cell_mut(base).constr.children.push(lut);
        }
        lut
    }

    /// As [`create_dram_lut`](Self::create_dram_lut) but for one half of a
    /// paired 32-entry port; `o5` selects the narrow lower-output BEL.
    fn create_dram32_lut(
        &mut self,
        name: &str,
        base: Option<CellId>,
        cs: &DramControlSet,
        address: &[Option<NetId>],
        di: Option<NetId>,
        dout: Option<NetId>,
        o5: bool,
        z: i32,
    ) -> CellId {
        let lut = self.nl.add_pending_cell(name, "RAMD32");
        for (i, a) in address.iter().enumerate() {
            if let Some(a) = *a {
                self.nl.connect_input(lut, &format!("RADR{i}"), a);
            }
        }
        if let Some(di) = di {
            self.nl.connect_input(lut, "I", di);
        }
        if let Some(dout) = dout {
            self.nl.connect_output(lut, "O", dout);
        }
        if let Some(wclk) = cs.wclk {
            self.nl.connect_input(lut, "CLK", wclk);
        }
        if let Some(we) = cs.we {
            self.nl.connect_input(lut, "WE", we);
        }
        for (i, a) in cs.wa.iter().enumerate() {
            if let Some(a) = *a {
                self.nl.connect_input(lut, &format!("WADR{i}"), a);
            }
        }
        let inv_key = self.nl.id("IS_WCLK_INVERTED");
        self.nl
            .cell_mut(lut)
            .params
            .insert(inv_key, Property::Int(cs.wclk_inv as i64));
        if o5 {
            xform_cell(self.nl, &self.dram32_5_rules, lut);
        } else {
            xform_cell(self.nl, &self.dram32_6_rules, lut);
        }

        let constr = &mut self.nl.cell_mut(lut).constr;
        constr.abs_z = true;
        constr.z = Some(slot_z(z, if o5 { BEL_5LUT } else { BEL_6LUT }));
        if let Some(base) = base {
            self.nl.cell_mut(lut).constr.parent = Some(base);
            self.nl.cell_mut(base).constr.children.push(lut);
        }
        lut
    }

    /// Rewrites ground-tied address inputs to logic-1 ties, permuting the
    /// initialization table to compensate. Logic-1 is the cheaper constant
    /// on this fabric.
    fn rewrite_tied_addresses(&mut self, types: &HashMap<Ident, DramType>) {
        let gnd = self.nl.gnd();
        let vcc = self.nl.vcc();
        let mut rewritten = 0usize;
        for cell in self.nl.sorted_cells() {
            let Some(&dt) = types.get(&self.nl.cell(cell).ty) else {
                continue;
            };
            for i in 0..dt.abits.min(6) {
                let aport_name = if dt.abits <= 6 {
                    format!("A{i}")
                } else {
                    format!("A[{i}]")
                };
                let aport = self.nl.id(&aport_name);
                if self.nl.port_net(cell, aport) != Some(gnd) {
                    continue;
                }
                let raport = if dt.rports >= 1 {
                    let raport_name = if dt.abits <= 6 {
                        format!("DPRA{i}")
                    } else {
                        format!("DPRA[{i}]")
                    };
                    let raport = self.nl.id(&raport_name);
                    // Both read addresses must agree or the rewrite would
                    // change what the dual port observes.
                    if self.nl.port_net(cell, raport) != Some(gnd) {
                        continue;
                    }
                    Some(raport)
                } else {
                    None
                };
                self.nl.disconnect(cell, aport);
                self.nl.connect(cell, aport, vcc);
                if let Some(raport) = raport {
                    self.nl.disconnect(cell, raport);
                    self.nl.connect(cell, raport, vcc);
                }
                rewritten += 1;
                let init_key = self.nl.id("INIT");
                let width = 1u32 << dt.abits;
                if let Some(init) = self.nl.cell(cell).params.get(&init_key) {
                    if let Some(mut bits) = init.to_bits(width) {
                        swap_init_bit(&mut bits, i);
                        self.nl
                            .cell_mut(cell)
                            .params
                            .insert(init_key, Property::Bits(bits));
                    }
                }
            }
        }
        self.sink.emit(Diagnostic::info(format!(
            "rewrote {rewritten} ground-tied memory address inputs to logic-1"
        )));
    }

    /// The cluster write address: at most six lines, including the padding
    /// line 32-deep groups carry.
    fn write_address(cs: &DramControlSet) -> Vec<Option<NetId>> {
        cs.wa.iter().take(6).copied().collect()
    }

    fn read_address(&self, cell: CellId, narrow: bool) -> Vec<Option<NetId>> {
        let lines = if narrow { 5 } else { 6 };
        let mut address: Vec<Option<NetId>> = (0..lines)
            .map(|i| self.nl.port_net(cell, self.nl.id(&format!("DPRA{i}"))))
            .collect();
        if narrow {
            address.push(Some(self.nl.vcc()));
        }
        address
    }

    /// Pads a 32-entry table into the upper half of a 64-entry one, matching
    /// the high read-address line the narrow ports are tied to.
    fn pad_narrow_init(init: &Property) -> Property {
        let bits = init.to_bits(32).unwrap_or_else(|| BitVec::new(32));
        Property::Bits(bits.shift_left(32))
    }

    fn set_init(&mut self, lut: CellId, init: Option<&Property>) {
        if let Some(init) = init {
            let key = self.nl.id("INIT");
            self.nl.cell_mut(lut).params.insert(key, init.clone());
        }
    }

    fn pack_dual_port_group(
        &mut self,
        cs: &DramControlSet,
        cells: &[CellId],
        height: i32,
        dt: DramType,
    ) -> LegalizeResult<()> {
        let narrow = dt.abits == 5;
        let mut z = height - 1;
        let mut base: Option<CellId> = None;
        for &cell in cells {
            let cell_name = self.nl.cell_name(cell).to_string();
            let init_key = self.nl.id("INIT");
            let init = self.nl.cell(cell).params.get(&init_key).cloned();
            let init = if narrow {
                init.map(|p| Self::pad_narrow_init(&p))
            } else {
                init
            };

            let spo_port = self.nl.id("SPO");
            let dpo_port = self.nl.id("DPO");
            let spo = self.nl.port_net(cell, spo_port);
            let dpo = self.nl.port_net(cell, dpo_port);
            let z_size = spo.is_some() as i32 + dpo.is_some() as i32;

            let mut spo_is_base = false;
            if z == height - 1 || z - z_size + 1 < 0 {
                z = height - 1;
                let address = Self::write_address(cs);
                base = Some(self.create_dram_lut(
                    &format!("{cell_name}/ADDR"),
                    None,
                    cs,
                    &address,
                    None,
                    None,
                    z,
                ));
                z -= 1;
                spo_is_base = true;
            }

            self.nl.disconnect(cell, dpo_port);
            self.nl.disconnect(cell, spo_port);
            let di = self.nl.port_net(cell, self.nl.id("D"));

            if let Some(spo) = spo {
                if let (true, Some(anchor)) = (spo_is_base, base) {
                    // The freshly created address LUT doubles as the
                    // single-ported read port.
                    self.nl.connect_output(anchor, "O6", spo);
                    if let Some(di) = di {
                        self.nl.connect_input(anchor, "DI1", di);
                    }
                    self.set_init(anchor, init.as_ref());
                } else {
                    let address = Self::write_address(cs);
                    let lut = self.create_dram_lut(
                        &format!("{cell_name}/SP"),
                        base,
                        cs,
                        &address,
                        di,
                        Some(spo),
                        z,
                    );
                    self.set_init(lut, init.as_ref());
                    z -= 1;
                }
            }
            if let Some(dpo) = dpo {
                let address = self.read_address(cell, narrow);
                let lut = self.create_dram_lut(
                    &format!("{cell_name}/DP"),
                    base,
                    cs,
                    &address,
                    di,
                    Some(dpo),
                    z,
                );
                self.set_init(lut, init.as_ref());
                z -= 1;
            }
            self.packed.insert(cell);
        }
        Ok(())
    }

    fn pack_single_port_group(
        &mut self,
        cs: &DramControlSet,
        cells: &[CellId],
        height: i32,
        dt: DramType,
        falling_edge: bool,
    ) -> LegalizeResult<()> {
        let narrow = dt.abits == 5;
        let mut z = height - 1;
        let mut base: Option<CellId> = None;
        for &cell in cells {
            let cell_name = self.nl.cell_name(cell).to_string();
            let init_key = self.nl.id("INIT");
            let init = self.nl.cell(cell).params.get(&init_key).cloned();
            let init = if narrow {
                init.map(|p| Self::pad_narrow_init(&p))
            } else {
                init
            };
            let di = self.nl.port_net(cell, self.nl.id("D"));
            let dout = self.nl.port_net(cell, self.nl.id("O"));
            let o_port = self.nl.id("O");
            self.nl.disconnect(cell, o_port);

            if z < 0 {
                z = height - 1;
            }
            let address = Self::write_address(cs);
            let parent = if z == height - 1 { None } else { base };
            let lut = self.create_dram_lut(&cell_name, parent, cs, &address, di, dout, z);
            if parent.is_none() {
                base = Some(lut);
            }
            self.set_init(lut, init.as_ref());
            if falling_edge {
                let key = self.nl.id("CLK_STATUS");
                self.nl
                    .cell_mut(lut)
                    .attrs
                    .insert(key, Property::from("CLKINV"));
            }
            z -= 1;
            self.packed.insert(cell);
        }
        Ok(())
    }

    fn pack_ram32x2s_group(
        &mut self,
        cs: &DramControlSet,
        cells: &[CellId],
        height: i32,
        dt: DramType,
    ) -> LegalizeResult<()> {
        let mut z = height - 1;
        let mut base: Option<CellId> = None;
        for &cell in cells {
            if z < 1 {
                z = height - 1;
                base = None;
            }
            let cell_name = self.nl.cell_name(cell).to_string();
            let mut address: Vec<Option<NetId>> = (0..5)
                .map(|i| self.nl.port_net(cell, self.nl.id(&format!("A{i}"))))
                .collect();
            address.push(Some(self.nl.vcc()));

            for bit in 0..dt.dbits {
                let di = self.nl.port_net(cell, self.nl.id(&format!("D{bit}")));
                let o_port = self.nl.id(&format!("O{bit}"));
                let dout = self.nl.port_net(cell, o_port);
                self.nl.disconnect(cell, o_port);

                let lut = self.create_dram_lut(
                    &format!("{cell_name}/RAM32X1S{bit}/SP"),
                    base,
                    cs,
                    &address,
                    di,
                    dout,
                    z,
                );
                let init_key = self.nl.id(&format!("INIT_0{bit}"));
                let init = self.nl.cell(cell).params.get(&init_key).cloned();
                self.set_init(lut, init.map(|p| Self::pad_narrow_init(&p)).as_ref());
                if base.is_none() {
                    base = Some(lut);
                }
                z -= 1;
            }
            self.packed.insert(cell);
        }
        Ok(())
    }

    fn pack_ram128x1s(&mut self, cs: &DramControlSet, cells: &[CellId], height: i32) -> LegalizeResult<()> {
        for &cell in cells {
            let mut z = height - 1;
            let cell_name = self.nl.cell_name(cell).to_string();
            let di = self.nl.port_net(cell, self.nl.id("D"));
            let o_port = self.nl.id("O");
            let dout = self.nl.port_net(cell, o_port);
            self.nl.disconnect(cell, o_port);

            let address_low: Vec<Option<NetId>> = cs.wa[..6].to_vec();
            let address_high: Vec<Option<NetId>> = cs.wa[6..].to_vec();

            let dout_low = self.nl.create_internal_net(cell, "O_LOW");
            let low = self.create_dram_lut(
                &format!("{cell_name}/LOW"),
                None,
                cs,
                &address_low,
                di,
                Some(dout_low),
                z,
            );
            z -= 1;
            let dout_high = self.nl.create_internal_net(cell, "O_HIGH");
            let high = self.create_dram_lut(
                &format!("{cell_name}/HIGH"),
                Some(low),
                cs,
                &address_low,
                di,
                Some(dout_high),
                z,
            );

            let init_key = self.nl.id("INIT");
            if let Some(init) = self.nl.cell(cell).params.get(&init_key).cloned() {
                self.set_init(low, init.extract(0, 64).as_ref());
                self.set_init(high, init.extract(64, 64).as_ref());
            }

            self.create_muxf_tree(
                low,
                "O",
                &[Some(dout_low), Some(dout_high)],
                &address_high,
                dout,
                2,
            )?;
            self.packed.insert(cell);
        }
        Ok(())
    }

    fn pack_ram256x1s(&mut self, cs: &DramControlSet, cells: &[CellId], height: i32) -> LegalizeResult<()> {
        for &cell in cells {
            let mut z = height - 1;
            let cell_name = self.nl.cell_name(cell).to_string();
            let di = self.nl.port_net(cell, self.nl.id("D"));
            let o_port = self.nl.id("O");
            let dout = self.nl.port_net(cell, o_port);
            self.nl.disconnect(cell, o_port);

            let address_low: Vec<Option<NetId>> = cs.wa[..6].to_vec();
            let address_high: Vec<Option<NetId>> = cs.wa[6..].to_vec();

            let mut leaves = Vec::with_capacity(4);
            let mut luts = Vec::with_capacity(4);
            for quarter in ["D", "C", "B", "A"] {
                let seam = self
                    .nl
                    .create_internal_net(cell, &format!("O_RAMS64E_{quarter}"));
                let parent = luts.first().copied();
                let lut = self.create_dram_lut(
                    &format!("{cell_name}/RAMS64E_{quarter}"),
                    parent,
                    cs,
                    &address_low,
                    di,
                    Some(seam),
                    z,
                );
                z -= 1;
                leaves.push(Some(seam));
                luts.push(lut);
            }

            let init_key = self.nl.id("INIT");
            if let Some(init) = self.nl.cell(cell).params.get(&init_key).cloned() {
                // Quarter D sits at the top of the cluster and holds the
                // highest addresses.
                for (i, &lut) in luts.iter().enumerate() {
                    let offset = 64 * (3 - i as u32);
                    self.set_init(lut, init.extract(offset, 64).as_ref());
                }
            }
            self.create_muxf_tree(luts[0], "O", &leaves, &address_high, dout, 0)?;
            self.packed.insert(cell);
        }
        Ok(())
    }

    fn pack_ram128x1d(&mut self, cs: &DramControlSet, cells: &[CellId], height: i32) -> LegalizeResult<()> {
        for &cell in cells {
            let mut z = height - 1;
            let cell_name = self.nl.cell_name(cell).to_string();
            let init_key = self.nl.id("INIT");
            let init = self
                .nl
                .cell(cell)
                .params
                .get(&init_key)
                .cloned()
                .unwrap_or(Property::Bits(BitVec::new(128)));

            let spo_port = self.nl.id("SPO");
            let dpo_port = self.nl.id("DPO");
            let spo = self.nl.port_net(cell, spo_port);
            let dpo = self.nl.port_net(cell, dpo_port);
            self.nl.disconnect(cell, dpo_port);
            self.nl.disconnect(cell, spo_port);
            let di = self.nl.port_net(cell, self.nl.id("D"));

            let address_w64: Vec<Option<NetId>> = cs.wa[..6].to_vec();
            let address_w_high: Vec<Option<NetId>> = cs.wa[6..].to_vec();

            let spo_low = self.nl.create_internal_net(cell, "SPO_LOW");
            let sp_low = self.create_dram_lut(
                &format!("{cell_name}/SP.LOW"),
                None,
                cs,
                &address_w64,
                di,
                Some(spo_low),
                z,
            );
            self.set_init(sp_low, init.extract(0, 64).as_ref());
            z -= 1;
            let spo_high = self.nl.create_internal_net(cell, "SPO_HIGH");
            let sp_high = self.create_dram_lut(
                &format!("{cell_name}/SP.HIGH"),
                Some(sp_low),
                cs,
                &address_w64,
                di,
                Some(spo_high),
                z,
            );
            self.set_init(sp_high, init.extract(64, 64).as_ref());
            z -= 1;

            let mut address_r64: Vec<Option<NetId>> = Vec::with_capacity(6);
            let mut address_r_high: Vec<Option<NetId>> = Vec::with_capacity(1);
            for i in 0..7 {
                let net = self.nl.port_net(cell, self.nl.id(&format!("DPRA[{i}]")));
                if i >= 6 {
                    address_r_high.push(net);
                } else {
                    address_r64.push(net);
                }
            }

            let dpo_low = self.nl.create_internal_net(cell, "DPO_LOW");
            let dp_low = self.create_dram_lut(
                &format!("{cell_name}/DP.LOW"),
                Some(sp_low),
                cs,
                &address_r64,
                di,
                Some(dpo_low),
                z,
            );
            self.set_init(dp_low, init.extract(0, 64).as_ref());
            z -= 1;
            let dpo_high = self.nl.create_internal_net(cell, "DPO_HIGH");
            let dp_high = self.create_dram_lut(
                &format!("{cell_name}/DP.HIGH"),
                Some(sp_low),
                cs,
                &address_r64,
                di,
                Some(dpo_high),
                z,
            );
            self.set_init(dp_high, init.extract(64, 64).as_ref());

            self.create_muxf_tree(
                sp_low,
                "SPO",
                &[Some(spo_low), Some(spo_high)],
                &address_w_high,
                spo,
                2,
            )?;
            self.create_muxf_tree(
                sp_low,
                "DPO",
                &[Some(dpo_low), Some(dpo_high)],
                &address_r_high,
                dpo,
                0,
            )?;
            self.packed.insert(cell);
        }
        Ok(())
    }

    /// Packs the whole-slice banked memories (`RAM64M`/`RAM32M`), whose four
    /// banks occupy fixed slots of a single slice.
    fn pack_banked_dram(&mut self) -> LegalizeResult<()> {
        for cell in self.nl.sorted_cells() {
            let ty = self.nl.cell(cell).ty;
            let memtype = self.nl.interner.resolve(ty);
            if memtype != "RAM64M" && memtype != "RAM32M" {
                continue;
            }
            let is_64 = memtype == "RAM64M";
            let abits = if is_64 { 6 } else { 5 };
            let cell_name = self.nl.cell_name(cell).to_string();

            // Bank D's address doubles as the shared write address.
            let wa: Vec<Option<NetId>> = (0..abits)
                .map(|i| self.nl.port_net(cell, self.nl.id(&format!("ADDRD[{i}]"))))
                .collect();
            let wclk_inv_key = self.nl.id("IS_WCLK_INVERTED");
            let dcs = DramControlSet {
                wa,
                wclk: self.nl.port_net(cell, self.nl.id("WCLK")),
                we: self.nl.port_net(cell, self.nl.id("WE")),
                wclk_inv: self.nl.cell(cell).bool_param_or(wclk_inv_key, false),
                memtype: ty,
            };

            let mut base: Option<CellId> = None;
            let zoffset = self.family.banked_dram_zoffset();
            for bank in 0..4i32 {
                let bank_ch = (b'A' + bank as u8) as char;
                let address: Vec<Option<NetId>> = (0..abits)
                    .map(|j| {
                        self.nl
                            .port_net(cell, self.nl.id(&format!("ADDR{bank_ch}[{j}]")))
                    })
                    .collect();
                let init_key = self.nl.id(&format!("INIT_{bank_ch}"));
                if is_64 {
                    let di_port = self.nl.id(&format!("DI{bank_ch}"));
                    let do_port = self.nl.id(&format!("DO{bank_ch}"));
                    let di = self.nl.port_net(cell, di_port);
                    let dout = self.nl.port_net(cell, do_port);
                    self.nl.disconnect(cell, di_port);
                    self.nl.disconnect(cell, do_port);
                    let lut = self.create_dram_lut(
                        &format!("{cell_name}/DPR{bank}"),
                        base,
                        &dcs,
                        &address,
                        di,
                        dout,
                        zoffset + bank,
                    );
                    if base.is_none() {
                        base = Some(lut);
                    }
                    let init = self.nl.cell(cell).params.get(&init_key).cloned();
                    self.set_init(lut, init.as_ref());
                } else {
                    for j in 0..2u32 {
                        let di_port = self.nl.id(&format!("DI{bank_ch}[{j}]"));
                        let do_port = self.nl.id(&format!("DO{bank_ch}[{j}]"));
                        let di = self.nl.port_net(cell, di_port);
                        let dout = self.nl.port_net(cell, do_port);
                        self.nl.disconnect(cell, di_port);
                        self.nl.disconnect(cell, do_port);
                        let lut = self.create_dram32_lut(
                            &format!("{cell_name}/DPR{bank}_{j}"),
                            base,
                            &dcs,
                            &address,
                            di,
                            dout,
                            j == 0,
                            zoffset + bank,
                        );
                        if base.is_none() {
                            base = Some(lut);
                        }
                        // The bank table interleaves its two output bits;
                        // each half-port takes every other entry.
                        if let Some(init) = self.nl.cell(cell).params.get(&init_key) {
                            if let Some(bits) = init.to_bits(64) {
                                let mut lane = BitVec::new(32);
                                for k in 0..32 {
                                    lane.set(k, bits.get(k * 2 + j));
                                }
                                let key = self.nl.id("INIT");
                                self.nl
                                    .cell_mut(lut)
                                    .params
                                    .insert(key, Property::Bits(lane));
                            }
                        }
                    }
                }
            }
            self.packed.insert(cell);
        }
        Ok(())
    }

    /// Packs all distributed memories into slice clusters.
    pub fn pack_dram(&mut self) -> LegalizeResult<()> {
        self.sink.emit(Diagnostic::info("packing distributed RAM"));
        self.setup_dram_rules();
        let types = self.dram_type_table();
        self.rewrite_tied_addresses(&types);

        // Group by write-port control set, preserving first-seen order of
        // the name-sorted sweep so cluster assignment is deterministic.
        let mut group_order: Vec<DramControlSet> = Vec::new();
        let mut groups: HashMap<DramControlSet, Vec<CellId>> = HashMap::new();
        for cell in self.nl.sorted_cells() {
            let ty = self.nl.cell(cell).ty;
            let Some(&dt) = types.get(&ty) else {
                continue;
            };
            let mut wa: Vec<Option<NetId>> = (0..dt.abits)
                .map(|i| {
                    let port = if dt.abits <= 6 {
                        format!("A{i}")
                    } else {
                        format!("A[{i}]")
                    };
                    self.nl.port_net(cell, self.nl.id(&port))
                })
                .collect();
            if dt.abits == 5 {
                wa.push(Some(self.nl.vcc()));
            }
            let wclk_inv_key = self.nl.id("IS_WCLK_INVERTED");
            let wclk_inv = self.nl.cell(cell).bool_param_or(wclk_inv_key, false)
                || ty == self.nl.id("RAM32X1S_1")
                || ty == self.nl.id("RAM64X1S_1");
            let dcs = DramControlSet {
                wa,
                wclk: self.nl.port_net(cell, self.nl.id("WCLK")),
                we: self.nl.port_net(cell, self.nl.id("WE")),
                wclk_inv,
                memtype: ty,
            };
            match groups.entry(dcs) {
                Entry::Occupied(mut e) => e.get_mut().push(cell),
                Entry::Vacant(e) => {
                    group_order.push(e.key().clone());
                    e.insert(vec![cell]);
                }
            }
        }

        let height = self.family.dram_height();
        for cs in group_order {
            let cells = groups.remove(&cs).unwrap_or_default();
            let dt = types[&cs.memtype];
            match self.nl.interner.resolve(cs.memtype) {
                "RAM64X1D" | "RAM32X1D" => self.pack_dual_port_group(&cs, &cells, height, dt)?,
                "RAM32X1S" | "RAM64X1S" => {
                    self.pack_single_port_group(&cs, &cells, height, dt, false)?
                }
                "RAM32X1S_1" | "RAM64X1S_1" => {
                    self.pack_single_port_group(&cs, &cells, height, dt, true)?
                }
                "RAM32X2S" => self.pack_ram32x2s_group(&cs, &cells, height, dt)?,
                "RAM128X1S" => self.pack_ram128x1s(&cs, &cells, height)?,
                "RAM256X1S" => self.pack_ram256x1s(&cs, &cells, height)?,
                "RAM128X1D" => self.pack_ram128x1d(&cs, &cells, height)?,
                other => {
                    return Err(InternalError::new(format!(
                        "unhandled distributed memory type {other}"
                    ))
                    .into())
                }
            }
        }

        self.pack_banked_dram()?;
        self.flush_cells();
        Ok(())
    }
}
