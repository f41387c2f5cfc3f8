use crate::plan::{ComponentPlan, Cut, Plan, Step};
use itertools::Itertools;
use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};
use std::borrow::Cow;
use std::default::Default;
use std::io::{BufWriter, Write};

#[derive(Clone)]
enum ExplainNode<'a> {
    Plan(&'a Plan),
    Component(&'a ComponentPlan),
    Cut(&'a Cut),
    Step(&'a Step),
}

impl<'a> TreeItem for ExplainNode<'a> {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        let text = match self {
            ExplainNode::Plan(plan) => format!(
                "Plan {{ estimate: {}, cost: {} }}",
                plan.estimate(),
                plan.cost()
            ),
            ExplainNode::Component(c) => format!(
                "Component {{ atoms: {:?}, inputs: [{}], estimate: {} }}",
                c.atoms,
                c.inputs.iter().join(", "),
                c.estimate
            ),
            ExplainNode::Cut(cut) => format!("Cut {{ keys: [{}] }}", cut.keys.iter().join(", ")),
            ExplainNode::Step(step) => format!(
                "{} #{} {} {{ input: {}, fanout: {}, cost: {} }}",
                step.access, step.atom, step.label, step.input, step.fanout, step.cost
            ),
        };
        write!(f, "{}", style.paint(text))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        let children = match self {
            ExplainNode::Plan(plan) => plan
                .components()
                .iter()
                .map(ExplainNode::Component)
                .collect(),
            ExplainNode::Component(c) => c
                .steps
                .iter()
                .map(ExplainNode::Step)
                .chain(c.cut.iter().map(ExplainNode::Cut))
                .collect(),
            ExplainNode::Cut(cut) => cut.components.iter().map(ExplainNode::Component).collect(),
            ExplainNode::Step(_) => vec![],
        };
        Cow::from(children)
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    write_tree_with(&ExplainNode::Plan(plan), output, &config)
}

pub fn explain_to_string(plan: &Plan) -> std::io::Result<String> {
    let mut buf = BufWriter::new(Vec::new());

    explain(plan, &mut buf)?;

    let bytes = buf.into_inner()?;
    String::from_utf8(bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
