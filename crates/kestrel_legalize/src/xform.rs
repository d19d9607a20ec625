//! The table-driven cell rewrite engine.
//!
//! Most legalizations are mechanical: retype the cell, rename some ports,
//! rename some parameters, inject some fixed attributes. An [`XFormRule`]
//! captures one such rewrite per source type; [`generic_xform`] sweeps the
//! netlist applying a rule table. Anything a table cannot express (tie-offs,
//! inverter folding, structural splits) happens in pass code before or after
//! the table is applied.

use crate::Packer;
use kestrel_common::Ident;
use kestrel_netlist::{CellId, Netlist, PortDir, Property};
use std::collections::HashMap;

/// A parameter or attribute injected by a rewrite rule.
#[derive(Clone, Debug)]
pub struct Injection {
    /// The key to set.
    pub key: Ident,
    /// The value to set it to.
    pub value: Property,
    /// When `false`, an existing value wins over the injected one.
    pub force: bool,
}

impl Injection {
    /// An injection that yields to a pre-existing value.
    pub fn default_value(key: Ident, value: Property) -> Self {
        Self {
            key,
            value,
            force: false,
        }
    }

    /// An injection that overwrites any pre-existing value.
    pub fn forced(key: Ident, value: Property) -> Self {
        Self {
            key,
            value,
            force: true,
        }
    }
}

/// One rewrite rule: how a cell of a given source type becomes its target.
///
/// Ports matched by neither [`port_xform`](Self::port_xform) nor
/// [`port_multixform`](Self::port_multixform) keep their name, with any
/// square brackets stripped (`D[3]` becomes `D3`).
#[derive(Clone, Debug)]
pub struct XFormRule {
    /// The type the cell is rewritten to.
    pub new_type: Ident,
    /// One-to-one port renames.
    pub port_xform: HashMap<Ident, Ident>,
    /// One-to-many port splits: the source port is removed and every target
    /// port is created connected to the same net.
    pub port_multixform: HashMap<Ident, Vec<Ident>>,
    /// Parameter renames (values preserved).
    pub param_xform: HashMap<Ident, Ident>,
    /// Parameters injected after the renames.
    pub set_params: Vec<Injection>,
    /// Attributes injected after the renames.
    pub set_attrs: Vec<Injection>,
}

impl XFormRule {
    /// A rule that only retypes the cell.
    pub fn retype(new_type: Ident) -> Self {
        Self {
            new_type,
            port_xform: HashMap::new(),
            port_multixform: HashMap::new(),
            param_xform: HashMap::new(),
            set_params: Vec::new(),
            set_attrs: Vec::new(),
        }
    }

    /// Adds a one-to-one port rename.
    pub fn port(mut self, from: Ident, to: Ident) -> Self {
        self.port_xform.insert(from, to);
        self
    }

    /// Adds a one-to-many port split.
    pub fn multi_port(mut self, from: Ident, to: Vec<Ident>) -> Self {
        self.port_multixform.insert(from, to);
        self
    }

    /// Adds a parameter rename.
    pub fn param(mut self, from: Ident, to: Ident) -> Self {
        self.param_xform.insert(from, to);
        self
    }

    /// Adds a non-forcing attribute injection.
    pub fn attr(mut self, key: Ident, value: Property) -> Self {
        self.set_attrs.push(Injection::default_value(key, value));
        self
    }
}

/// Applies the matching rule from `rules` to one cell.
///
/// Returns `false` (and leaves the cell untouched) when no rule matches the
/// cell's type.
pub fn xform_cell(nl: &mut Netlist, rules: &HashMap<Ident, XFormRule>, cell: CellId) -> bool {
    let ty = nl.cell(cell).ty;
    let Some(rule) = rules.get(&ty) else {
        return false;
    };
    nl.cell_mut(cell).ty = rule.new_type;

    for port in nl.sorted_port_names(cell) {
        if let Some(&target) = rule.port_xform.get(&port) {
            nl.rename_port(cell, port, target);
        } else if let Some(targets) = rule.port_multixform.get(&port) {
            let dir = nl.cell(cell).ports[&port].dir;
            let net = nl.port_net(cell, port);
            nl.disconnect(cell, port);
            nl.cell_mut(cell).ports.remove(&port);
            for &target in targets {
                nl.add_port(cell, target, dir);
                if let Some(net) = net {
                    nl.connect(cell, target, net);
                }
            }
        } else {
            let name = nl.interner.resolve(port);
            if let Some(stripped) = strip_brackets(name) {
                let target = nl.id(&stripped);
                nl.rename_port(cell, port, target);
            }
        }
    }

    let mut renames: Vec<(Ident, Ident)> = rule.param_xform.iter().map(|(&f, &t)| (f, t)).collect();
    renames.sort_by(|a, b| nl.interner.resolve(a.0).cmp(nl.interner.resolve(b.0)));
    for (from, to) in renames {
        if let Some(value) = nl.cell_mut(cell).params.remove(&from) {
            nl.cell_mut(cell).params.insert(to, value);
        }
    }

    for inj in &rule.set_params {
        let params = &mut nl.cell_mut(cell).params;
        if inj.force || !params.contains_key(&inj.key) {
            params.insert(inj.key, inj.value.clone());
        }
    }
    for inj in &rule.set_attrs {
        let attrs = &mut nl.cell_mut(cell).attrs;
        if inj.force || !attrs.contains_key(&inj.key) {
            attrs.insert(inj.key, inj.value.clone());
        }
    }
    true
}

/// Applies a rule table to every live cell, returning how many matched.
pub fn generic_xform(nl: &mut Netlist, rules: &HashMap<Ident, XFormRule>) -> usize {
    let mut count = 0;
    for cell in nl.sorted_cells() {
        if xform_cell(nl, rules, cell) {
            count += 1;
        }
    }
    count
}

/// Returns the bracket-stripped name, or `None` if there is nothing to strip.
pub(crate) fn strip_brackets(name: &str) -> Option<String> {
    if name.contains(['[', ']']) {
        Some(name.chars().filter(|&c| c != '[' && c != ']').collect())
    } else {
        None
    }
}

impl Packer<'_, '_> {
    /// Ties an input port to a constant.
    ///
    /// The port is created if it is missing and left alone if it already
    /// carries a signal. A low tie on an invertible port is realized as a tie
    /// to logic-1 plus an `IS_<PORT>_INVERTED` parameter, because logic-1 is
    /// the cheaper constant to route on this fabric.
    pub(crate) fn tie_port(&mut self, cell: CellId, port: &str, value: bool, invertible: bool) {
        let ident = self.nl.id(port);
        if self.nl.port_net(cell, ident).is_some() {
            return;
        }
        if !self.nl.cell(cell).ports.contains_key(&ident) {
            self.nl.add_port(cell, ident, PortDir::Input);
        }
        let net = if value || invertible {
            self.nl.vcc()
        } else {
            self.nl.gnd()
        };
        self.nl.connect(cell, ident, net);
        if !value && invertible {
            let key = self.nl.id(&format!("IS_{port}_INVERTED"));
            self.nl.cell_mut(cell).params.insert(key, Property::Int(1));
        }
    }

    /// Absorbs an inverter driving `port` into the cell's own inversion flag.
    ///
    /// Recognizes `INV` cells and `LUT1` cells with `INIT == 1`. The port is
    /// reconnected to the inverter's input net, `IS_<PORT>_INVERTED` is set,
    /// and the inverter is marked packed once its output has no users left.
    pub(crate) fn fold_inverter(&mut self, cell: CellId, port: &str) {
        let ident = self.nl.id(port);
        let Some(net) = self.nl.port_net(cell, ident) else {
            return;
        };
        let Some(driver) = self.nl.net(net).driver else {
            return;
        };
        let inv = driver.cell;
        let inv_ty = self.nl.cell(inv).ty;
        let inv_input = if inv_ty == self.nl.id("INV") {
            "I"
        } else if inv_ty == self.nl.id("LUT1")
            && self.nl.cell(inv).int_param_or(self.nl.id("INIT"), 0) == 1
        {
            "I0"
        } else {
            return;
        };
        let source = self.nl.port_net(inv, self.nl.id(inv_input));
        self.nl.disconnect(cell, ident);
        if let Some(source) = source {
            self.nl.connect(cell, ident, source);
        }
        let key = self.nl.id(&format!("IS_{port}_INVERTED"));
        self.nl.cell_mut(cell).params.insert(key, Property::Int(1));
        if self.nl.net(net).users.is_empty() {
            self.packed.insert(inv);
        }
    }

    /// Records a non-binding placement hint: put `cell` near whatever drives
    /// `port`. Constant and undriven ports leave no hint.
    pub(crate) fn hint_near(&mut self, cell: CellId, port: &str) {
        let ident = self.nl.id(port);
        let Some(net) = self.nl.port_net(cell, ident) else {
            return;
        };
        if self.nl.is_constant(net) {
            return;
        }
        let Some(driver) = self.nl.net_driver_cell(net) else {
            return;
        };
        let hint = self.nl.cell_name(driver).to_string();
        let key = self.nl.id("PLACE_NEAR");
        self.nl
            .cell_mut(cell)
            .attrs
            .insert(key, Property::Str(hint));
    }

    /// Sets a parameter only when the design has not already provided one.
    pub(crate) fn default_param(&mut self, cell: CellId, key: &str, value: Property) {
        let key = self.nl.id(key);
        self.nl.cell_mut(cell).params.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{new_packer, TestCtx};
    use kestrel_common::Interner;
    use kestrel_netlist::Netlist;

    #[test]
    fn strip_brackets_rewrites_indexed_names() {
        assert_eq!(strip_brackets("D[3]").as_deref(), Some("D3"));
        assert_eq!(strip_brackets("DPRA[15]").as_deref(), Some("DPRA15"));
        assert_eq!(strip_brackets("CE0"), None);
    }

    #[test]
    fn xform_retypes_and_renames() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let net = nl.add_net("clk_in");
        let cell = nl.add_cell("buf0", "BUFG");
        nl.connect_input(cell, "I", net);

        let mut rules = HashMap::new();
        rules.insert(
            nl.id("BUFG"),
            XFormRule::retype(nl.id("BUFGCTRL")).port(nl.id("I"), nl.id("I0")),
        );
        assert!(xform_cell(&mut nl, &rules, cell));
        assert_eq!(nl.cell(cell).ty, nl.id("BUFGCTRL"));
        assert_eq!(nl.port_net(cell, nl.id("I0")), Some(net));
        assert_eq!(nl.port_net(cell, nl.id("I")), None);
    }

    #[test]
    fn xform_unmatched_type_is_untouched() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let cell = nl.add_cell("ff0", "FDRE");
        let rules = HashMap::new();
        assert!(!xform_cell(&mut nl, &rules, cell));
        assert_eq!(nl.cell(cell).ty, nl.id("FDRE"));
    }

    #[test]
    fn multixform_broadcasts_one_net() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let sel = nl.add_net("sel");
        let cell = nl.add_cell("mux0", "BUFGMUX");
        nl.connect_input(cell, "S", sel);

        let mut rules = HashMap::new();
        rules.insert(
            nl.id("BUFGMUX"),
            XFormRule::retype(nl.id("BUFGCTRL"))
                .multi_port(nl.id("S"), vec![nl.id("CE0"), nl.id("CE1")]),
        );
        xform_cell(&mut nl, &rules, cell);
        assert_eq!(nl.port_net(cell, nl.id("S")), None);
        assert_eq!(nl.port_net(cell, nl.id("CE0")), Some(sel));
        assert_eq!(nl.port_net(cell, nl.id("CE1")), Some(sel));
        assert_eq!(nl.net(sel).users.len(), 2);
    }

    #[test]
    fn unmatched_bracketed_ports_are_flattened() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let net = nl.add_net("a6");
        let cell = nl.add_cell("ram0", "RAM128X1S");
        nl.connect_input(cell, "A[6]", net);

        let mut rules = HashMap::new();
        rules.insert(nl.id("RAM128X1S"), XFormRule::retype(nl.id("RAM128X1S")));
        xform_cell(&mut nl, &rules, cell);
        assert_eq!(nl.port_net(cell, nl.id("A6")), Some(net));
    }

    #[test]
    fn injected_attrs_do_not_overwrite() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let cell = nl.add_cell("lut0", "RAMD64E");
        let key = nl.id("X_LUT_AS_DRAM");
        nl.cell_mut(cell).attrs.insert(key, Property::Int(7));

        let mut rules = HashMap::new();
        rules.insert(
            nl.id("RAMD64E"),
            XFormRule::retype(nl.id("SLICE_LUTX")).attr(key, Property::Int(1)),
        );
        xform_cell(&mut nl, &rules, cell);
        assert_eq!(nl.cell(cell).attrs[&key], Property::Int(7));
    }

    #[test]
    fn param_rename_preserves_value() {
        let interner = Interner::new();
        let mut nl = Netlist::new(&interner);
        let cell = nl.add_cell("b0", "BUFGCE");
        let from = nl.id("IS_CE_INVERTED");
        let to = nl.id("IS_CE0_INVERTED");
        nl.cell_mut(cell).params.insert(from, Property::Int(1));

        let mut rules = HashMap::new();
        rules.insert(
            nl.id("BUFGCE"),
            XFormRule::retype(nl.id("BUFGCTRL")).param(from, to),
        );
        xform_cell(&mut nl, &rules, cell);
        let params = &nl.cell(cell).params;
        assert_eq!(params.get(&to), Some(&Property::Int(1)));
        assert!(!params.contains_key(&from));
    }

    #[test]
    fn tie_high_and_tie_low_invertible() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let cell = nl.add_cell("buf0", "BUFGCTRL");
        let vcc = nl.vcc();
        let mut p = new_packer(&mut nl, &ctx);
        p.tie_port(cell, "CE0", true, true);
        p.tie_port(cell, "S1", false, true);
        p.tie_port(cell, "IGNORE1", false, false);
        drop(p);
        assert_eq!(nl.port_net(cell, nl.id("CE0")), Some(vcc));
        // Low + invertible: tie high and invert.
        assert_eq!(nl.port_net(cell, nl.id("S1")), Some(vcc));
        assert_eq!(
            nl.cell(cell).params.get(&nl.id("IS_S1_INVERTED")),
            Some(&Property::Int(1))
        );
        // Low + non-invertible: a real ground tie.
        assert_eq!(nl.port_net(cell, nl.id("IGNORE1")), Some(nl.gnd()));
        assert!(!nl.cell(cell).params.contains_key(&nl.id("IS_IGNORE1_INVERTED")));
    }

    #[test]
    fn tie_skips_connected_port() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let net = nl.add_net("real_ce");
        let cell = nl.add_cell("buf0", "BUFHCE");
        nl.connect_input(cell, "CE", net);
        let mut p = new_packer(&mut nl, &ctx);
        p.tie_port(cell, "CE", true, true);
        drop(p);
        assert_eq!(nl.port_net(cell, nl.id("CE")), Some(net));
    }

    #[test]
    fn fold_inverter_absorbs_inv_cell() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let src = nl.add_net("ce_raw");
        let inverted = nl.add_net("ce_n");
        let inv = nl.add_cell("inv0", "INV");
        nl.connect_input(inv, "I", src);
        nl.connect_output(inv, "O", inverted);
        let buf = nl.add_cell("buf0", "BUFGCE");
        nl.connect_input(buf, "CE", inverted);

        let mut p = new_packer(&mut nl, &ctx);
        p.fold_inverter(buf, "CE");
        assert!(p.packed.contains(&inv));
        drop(p);
        assert_eq!(nl.port_net(buf, nl.id("CE")), Some(src));
        assert_eq!(
            nl.cell(buf).params.get(&nl.id("IS_CE_INVERTED")),
            Some(&Property::Int(1))
        );
    }

    #[test]
    fn fold_inverter_recognizes_lut1() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let src = nl.add_net("s_raw");
        let inverted = nl.add_net("s_n");
        let lut = nl.add_cell("lut0", "LUT1");
        nl.cell_mut(lut).params.insert(ctx.interner.id("INIT"), Property::Int(1));
        nl.connect_input(lut, "I0", src);
        nl.connect_output(lut, "O", inverted);
        let buf = nl.add_cell("mux0", "BUFGMUX");
        nl.connect_input(buf, "S", inverted);

        let mut p = new_packer(&mut nl, &ctx);
        p.fold_inverter(buf, "S");
        assert!(p.packed.contains(&lut));
        drop(p);
        assert_eq!(nl.port_net(buf, nl.id("S")), Some(src));
    }

    #[test]
    fn fold_inverter_ignores_noninverting_lut1() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let src = nl.add_net("s_raw");
        let passed = nl.add_net("s_buf");
        let lut = nl.add_cell("lut0", "LUT1");
        nl.cell_mut(lut).params.insert(ctx.interner.id("INIT"), Property::Int(2));
        nl.connect_input(lut, "I0", src);
        nl.connect_output(lut, "O", passed);
        let buf = nl.add_cell("mux0", "BUFGMUX");
        nl.connect_input(buf, "S", passed);

        let mut p = new_packer(&mut nl, &ctx);
        p.fold_inverter(buf, "S");
        assert!(p.packed.is_empty());
        drop(p);
        assert_eq!(nl.port_net(buf, nl.id("S")), Some(passed));
    }

    #[test]
    fn fold_inverter_keeps_shared_inverter_alive() {
        let ctx = TestCtx::new();
        let mut nl = Netlist::new(&ctx.interner);
        let src = nl.add_net("ce_raw");
        let inverted = nl.add_net("ce_n");
        let inv = nl.add_cell("inv0", "INV");
        nl.connect_input(inv, "I", src);
        nl.connect_output(inv, "O", inverted);
        let buf = nl.add_cell("buf0", "BUFGCE");
        nl.connect_input(buf, "CE", inverted);
        let other = nl.add_cell("ff0", "FDRE");
        nl.connect_input(other, "CE", inverted);

        let mut p = new_packer(&mut nl, &ctx);
        p.fold_inverter(buf, "CE");
        // Another user still needs the inverted net.
        assert!(p.packed.is_empty());
    }
}
