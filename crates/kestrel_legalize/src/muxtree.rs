//! Synthesis of intra-slice wide-mux selection trees.
//!
//! Memories deeper than one LUT read out through the slice's dedicated
//! selection muxes: a first level of `MUXF7` pairs LUT outputs, a `MUXF8`
//! pairs those, and a `MUXF9` tops out an eight-way select. The tree is
//! constrained into the same cluster as the LUTs it selects between.

use crate::{LegalizeError, LegalizeResult, Packer};
use kestrel_arch::bels::{slot_z, BEL_F7MUX, BEL_F8MUX, BEL_F9MUX};
use kestrel_netlist::{CellId, NetId};

impl Packer<'_, '_> {
    /// Builds a balanced selection tree over `data`, driving `out`.
    ///
    /// `data` must hold exactly 2, 4, or 8 leaf nets and `select` one net per
    /// tree level, lowest level first. Unconnected leaves and selects are
    /// permitted and leave the corresponding mux input open. All created
    /// muxes are constrained as absolute-slot children of `base`, with the
    /// bottom level starting at `zoffset`.
    pub(crate) fn create_muxf_tree(
        &mut self,
        base: CellId,
        name_base: &str,
        data: &[Option<NetId>],
        select: &[Option<NetId>],
        out: Option<NetId>,
        zoffset: i32,
    ) -> LegalizeResult<()> {
        let levels = match data.len() {
            2 => 1,
            4 => 2,
            8 => 3,
            n => {
                return Err(LegalizeError::config(format!(
                    "cannot build a selection tree over {n} inputs; 2, 4, or 8 are supported"
                )))
            }
        };
        if select.len() != levels {
            return Err(LegalizeError::config(format!(
                "selection tree over {} inputs needs {} select lines, got {}",
                data.len(),
                levels,
                select.len()
            )));
        }
        let base_name = self.nl.cell_name(base).to_string();
        let mut last: Vec<Option<NetId>> = data.to_vec();
        for level in 0..levels {
            let (mux_type, bel) = match level {
                0 => ("MUXF7", BEL_F7MUX),
                1 => ("MUXF8", BEL_F8MUX),
                _ => ("MUXF9", BEL_F9MUX),
            };
            let mut next = Vec::with_capacity(last.len() / 2);
            for j in 0..last.len() / 2 {
                let output = if level == levels - 1 {
                    out
                } else {
                    Some(
                        self.nl
                            .create_internal_net(base, &format!("{name_base}_muxq_{level}_{j}")),
                    )
                };
                next.push(output);
                let mux = self.nl.add_pending_cell(
                    &format!("{base_name}/{name_base}_muxf_{level}_{j}"),
                    mux_type,
                );
                if let Some(net) = last[2 * j] {
                    self.nl.connect_input(mux, "I0", net);
                }
                if let Some(net) = last[2 * j + 1] {
                    self.nl.connect_input(mux, "I1", net);
                }
                if let Some(net) = select[level] {
                    self.nl.connect_input(mux, "S", net);
                }
                if let Some(net) = output {
                    self.nl.connect_output(mux, "O", net);
                }
                let slot = match level {
                    0 => zoffset + 2 * j as i32,
                    1 => zoffset + 4 * j as i32,
                    _ => zoffset,
                };
                let constr = &mut self.nl.cell_mut(mux).constr;
                constr.parent = Some(base);
                constr.abs_z = true;
                constr.z = Some(slot_z(slot, bel));
                self.nl.cell_mut(base).constr.children.push(mux);
            }
            last = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{new_packer, TestCtx};
    use crate::LegalizeError;
    use kestrel_arch::bels::{slot_z, BEL_F7MUX, BEL_F8MUX, BEL_F9MUX};
    use kestrel_netlist::{CellId, NetId, Netlist};

    fn cells_of_type(nl: &Netlist, ty: &str) -> Vec<CellId> {
        let ty = nl.id(ty);
        nl.sorted_cells()
            .into_iter()
            .filter(|&c| nl.cell(c).ty == ty)
            .collect()
    }

    #[test]
    fn two_way_tree_is_one_muxf7() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let base = nl.add_cell("ram0/LOW", "SLICE_LUTX");
        let lo = nl.add_net("lo");
        let hi = nl.add_net("hi");
        let sel = nl.add_net("a6");
        let out = nl.add_net("q");

        let mut p = new_packer(&mut nl, &ctx);
        p.create_muxf_tree(base, "O", &[Some(lo), Some(hi)], &[Some(sel)], Some(out), 2)
            .unwrap();
        p.flush_cells();
        drop(p);

        let muxes = cells_of_type(&nl, "MUXF7");
        assert_eq!(muxes.len(), 1);
        let mux = muxes[0];
        assert_eq!(nl.cell_name(mux), "ram0/LOW/O_muxf_0_0");
        assert_eq!(nl.port_net(mux, nl.id("I0")), Some(lo));
        assert_eq!(nl.port_net(mux, nl.id("I1")), Some(hi));
        assert_eq!(nl.port_net(mux, nl.id("S")), Some(sel));
        assert_eq!(nl.net(out).driver.map(|d| d.cell), Some(mux));
        let constr = &nl.cell(mux).constr;
        assert_eq!(constr.parent, Some(base));
        assert!(constr.abs_z);
        assert_eq!(constr.z, Some(slot_z(2, BEL_F7MUX)));
        assert!(nl.cell(base).constr.children.contains(&mux));
    }

    #[test]
    fn eight_way_tree_has_three_levels() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let base = nl.add_cell("ram0/D", "SLICE_LUTX");
        let data: Vec<Option<NetId>> = (0..8)
            .map(|i| Some(nl.add_net(&format!("d{i}"))))
            .collect();
        let selects: Vec<Option<NetId>> = (0..3)
            .map(|i| Some(nl.add_net(&format!("s{i}"))))
            .collect();
        let out = nl.add_net("q");

        let mut p = new_packer(&mut nl, &ctx);
        p.create_muxf_tree(base, "O", &data, &selects, Some(out), 0)
            .unwrap();
        p.flush_cells();
        drop(p);

        let f7 = cells_of_type(&nl, "MUXF7");
        let f8 = cells_of_type(&nl, "MUXF8");
        let f9 = cells_of_type(&nl, "MUXF9");
        assert_eq!((f7.len(), f8.len(), f9.len()), (4, 2, 1));
        // Bottom level occupies every other slot; upper levels sit at the
        // cluster base.
        let f7_z: Vec<_> = f7.iter().map(|&c| nl.cell(c).constr.z).collect();
        assert!(f7_z.contains(&Some(slot_z(0, BEL_F7MUX))));
        assert!(f7_z.contains(&Some(slot_z(6, BEL_F7MUX))));
        let f8_z: Vec<_> = f8.iter().map(|&c| nl.cell(c).constr.z).collect();
        assert!(f8_z.contains(&Some(slot_z(0, BEL_F8MUX))));
        assert!(f8_z.contains(&Some(slot_z(4, BEL_F8MUX))));
        assert_eq!(nl.cell(f9[0]).constr.z, Some(slot_z(0, BEL_F9MUX)));
        assert_eq!(nl.net(out).driver.map(|d| d.cell), Some(f9[0]));
        // Internal seams chain bottom level into the top.
        let seam = nl.net_by_name(nl.id("ram0/D/O_muxq_0_0")).unwrap();
        assert_eq!(nl.net(seam).users.len(), 1);
        assert_eq!(nl.cell(base).constr.children.len(), 7);
    }

    #[test]
    fn unconnected_select_leaves_port_open() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let base = nl.add_cell("ram0", "SLICE_LUTX");
        let lo = nl.add_net("lo");
        let hi = nl.add_net("hi");
        let out = nl.add_net("q");

        let mut p = new_packer(&mut nl, &ctx);
        p.create_muxf_tree(base, "O", &[Some(lo), Some(hi)], &[None], Some(out), 0)
            .unwrap();
        p.flush_cells();
        drop(p);
        let mux = cells_of_type(&nl, "MUXF7")[0];
        assert_eq!(nl.port_net(mux, nl.id("S")), None);
    }

    #[test]
    fn odd_input_count_is_rejected() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let base = nl.add_cell("ram0", "SLICE_LUTX");
        let nets: Vec<Option<NetId>> = (0..3)
            .map(|i| Some(nl.add_net(&format!("d{i}"))))
            .collect();
        let out = nl.add_net("q");
        let mut p = new_packer(&mut nl, &ctx);
        let err = p
            .create_muxf_tree(base, "O", &nets, &[None, None], Some(out), 0)
            .unwrap_err();
        assert!(matches!(err, LegalizeError::Config(_)));
    }

    #[test]
    fn select_count_must_match_depth() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let base = nl.add_cell("ram0", "SLICE_LUTX");
        let nets: Vec<Option<NetId>> = (0..4)
            .map(|i| Some(nl.add_net(&format!("d{i}"))))
            .collect();
        let mut p = new_packer(&mut nl, &ctx);
        let err = p
            .create_muxf_tree(base, "O", &nets, &[None], None, 0)
            .unwrap_err();
        assert!(matches!(err, LegalizeError::Config(_)));
    }
}
