//! Module providing SBML IO for reaction network Models
//!
//! Models are written as SBML Level 3 Version 2 Core. The rate law of every reaction is
//! stored twice: as MathML in the kinetic law, and as a `type=<kind> key=value ...`
//! annotation so it can be read back with its kind intact. When reading, the annotation
//! wins over the MathML.
use std::borrow::Cow;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use tracing::{debug, info};

use crate::io::expr_parse::ExprParseError;
use crate::network::expression::{format_number, Expr};
use crate::network::model::{Compartment, Model, ModelError};
use crate::network::rate_law::{RateLaw, RateLawError};
use crate::network::reaction::Reaction;
use crate::network::species::Species;

const SBML_NS: &str = "http://www.sbml.org/sbml/level3/version2/core";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const ANNOTATION_NS: &str = "https://github.com/crnsim/rate-law";

// region Public API
impl Model {
    /// Read a model from an SBML file
    ///
    /// # Examples
    /// ```rust,no_run
    /// use crnsim_core::network::model::Model;
    /// let model = Model::read_sbml("model.xml").unwrap();
    /// ```
    pub fn read_sbml<P: AsRef<Path>>(path: P) -> Result<Model, SbmlError> {
        let xml = fs::read_to_string(path.as_ref())?;
        let model = Model::from_sbml_str(&xml)?;
        info!(
            path = %path.as_ref().display(),
            species = model.species.len(),
            reactions = model.reactions.len(),
            "read SBML model"
        );
        Ok(model)
    }

    /// Parse a model from an SBML document
    pub fn from_sbml_str(xml: &str) -> Result<Model, SbmlError> {
        let root = parse_document(xml)?;
        model_from_document(&root)
    }

    /// Write the model to an SBML file
    pub fn write_sbml<P: AsRef<Path>>(&self, path: P) -> Result<(), SbmlError> {
        fs::write(path.as_ref(), self.to_sbml_string()?)?;
        info!(path = %path.as_ref().display(), "wrote SBML model");
        Ok(())
    }

    /// Render the model as an SBML document
    pub fn to_sbml_string(&self) -> Result<String, SbmlError> {
        let mut writer = SbmlWriter::new();
        writer.write_model(self)?;
        writer.finish()
    }
}

/// Read only the species ids of an SBML file, in document order
pub fn species_ids_from_sbml<P: AsRef<Path>>(path: P) -> Result<Vec<String>, SbmlError> {
    let xml = fs::read_to_string(path)?;
    let root = parse_document(&xml)?;
    let model = sbml_model(&root)?;
    model
        .child("listOfSpecies")
        .map(|list| {
            list.children_named("species")
                .map(|s| s.required("id"))
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}
// endregion Public API

// region Writing
struct SbmlWriter {
    writer: Writer<Vec<u8>>,
}

impl SbmlWriter {
    fn new() -> Self {
        SbmlWriter {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn finish(self) -> Result<String, SbmlError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| SbmlError::Malformed(e.to_string()))
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), SbmlError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), SbmlError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), SbmlError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<(), SbmlError> {
        self.start(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn write_model(&mut self, model: &Model) -> Result<(), SbmlError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.start(
            "sbml",
            &[("xmlns", SBML_NS), ("level", "3"), ("version", "2")],
        )?;
        match &model.id {
            Some(id) => self.start("model", &[("id", id.as_str())])?,
            None => self.start("model", &[])?,
        }

        let size = format_number(model.compartment.size);
        self.start("listOfCompartments", &[])?;
        self.empty(
            "compartment",
            &[
                ("id", model.compartment.id.as_str()),
                ("size", size.as_str()),
                ("spatialDimensions", "3"),
                ("constant", "true"),
            ],
        )?;
        self.end("listOfCompartments")?;

        if !model.species.is_empty() {
            self.start("listOfSpecies", &[])?;
            for species in model.species.values() {
                self.write_species(species, &model.compartment.id)?;
            }
            self.end("listOfSpecies")?;
        }

        if !model.parameters.is_empty() {
            self.start("listOfParameters", &[])?;
            for (id, value) in &model.parameters {
                let value = format_number(*value);
                self.empty(
                    "parameter",
                    &[("id", id.as_str()), ("value", value.as_str()), ("constant", "true")],
                )?;
            }
            self.end("listOfParameters")?;
        }

        if !model.reactions.is_empty() {
            self.start("listOfReactions", &[])?;
            for reaction in model.reactions.values() {
                self.write_reaction(reaction)?;
            }
            self.end("listOfReactions")?;
        }

        self.end("model")?;
        self.end("sbml")
    }

    fn write_species(&mut self, species: &Species, default_compartment: &str) -> Result<(), SbmlError> {
        let initial = format_number(species.initial);
        let compartment = species.compartment.as_deref().unwrap_or(default_compartment);
        let mut attributes = vec![("id", species.id.as_str())];
        if let Some(name) = &species.name {
            attributes.push(("name", name.as_str()));
        }
        attributes.extend([
            ("compartment", compartment),
            ("initialConcentration", initial.as_str()),
            ("hasOnlySubstanceUnits", "false"),
            ("boundaryCondition", "false"),
            ("constant", "false"),
        ]);
        self.empty("species", &attributes)
    }

    fn write_reaction(&mut self, reaction: &Reaction) -> Result<(), SbmlError> {
        let mut attributes = vec![("id", reaction.id.as_str())];
        if let Some(name) = &reaction.name {
            attributes.push(("name", name.as_str()));
        }
        attributes.push(("reversible", "false"));
        self.start("reaction", &attributes)?;

        self.start("annotation", &[])?;
        self.text_element(
            "crnsim:rateLaw",
            &[("xmlns:crnsim", ANNOTATION_NS)],
            &reaction.rate_law.to_annotation(),
        )?;
        self.end("annotation")?;

        self.write_species_references("listOfReactants", &reaction.reactants)?;
        self.write_species_references("listOfProducts", &reaction.products)?;
        let modifiers = reaction.modifiers();
        if !modifiers.is_empty() {
            self.start("listOfModifiers", &[])?;
            for species in &modifiers {
                self.empty("modifierSpeciesReference", &[("species", species.as_str())])?;
            }
            self.end("listOfModifiers")?;
        }

        self.start("kineticLaw", &[])?;
        self.start("math", &[("xmlns", MATHML_NS)])?;
        self.write_math(&reaction.rate_law.to_expr(&reaction.reactants))?;
        self.end("math")?;
        self.end("kineticLaw")?;

        self.end("reaction")
    }

    fn write_species_references(
        &mut self,
        list: &str,
        references: &IndexMap<String, f64>,
    ) -> Result<(), SbmlError> {
        if references.is_empty() {
            return Ok(());
        }
        self.start(list, &[])?;
        for (species, stoichiometry) in references {
            let stoichiometry = format_number(*stoichiometry);
            self.empty(
                "speciesReference",
                &[
                    ("species", species.as_str()),
                    ("stoichiometry", stoichiometry.as_str()),
                    ("constant", "true"),
                ],
            )?;
        }
        self.end(list)
    }

    fn write_math(&mut self, expr: &Expr) -> Result<(), SbmlError> {
        match expr {
            Expr::Number(value) => self.text_element("cn", &[], &format_number(*value)),
            Expr::Symbol(name) => self.text_element("ci", &[], name),
            Expr::Add(terms) => self.write_apply("plus", terms.iter()),
            Expr::Mul(factors) => self.write_apply("times", factors.iter()),
            Expr::Sub(left, right) => self.write_apply("minus", [&**left, &**right].into_iter()),
            Expr::Div(left, right) => self.write_apply("divide", [&**left, &**right].into_iter()),
            Expr::Pow(base, exponent) => {
                self.write_apply("power", [&**base, &**exponent].into_iter())
            }
            Expr::Neg(inner) => self.write_apply("minus", std::iter::once(&**inner)),
        }
    }

    fn write_apply<'e>(
        &mut self,
        operator: &str,
        arguments: impl Iterator<Item = &'e Expr>,
    ) -> Result<(), SbmlError> {
        self.start("apply", &[])?;
        self.empty(operator, &[])?;
        for argument in arguments {
            self.write_math(argument)?;
        }
        self.end("apply")
    }
}
// endregion Writing

// region Reading
/// Minimal element tree of an XML document, names are stored without namespace prefix
#[derive(Clone, Debug, Default, PartialEq)]
struct Element {
    name: String,
    attributes: IndexMap<String, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth first search for the first descendant with one of the given names
    fn find_descendant(&self, names: &[&str]) -> Option<&Element> {
        for child in &self.children {
            if names.contains(&child.name.as_str()) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(names) {
                return Some(found);
            }
        }
        None
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    fn required(&self, name: &str) -> Result<String, SbmlError> {
        self.attribute(name)
            .map(|s| s.to_string())
            .ok_or_else(|| SbmlError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    fn number(&self, name: &str) -> Result<Option<f64>, SbmlError> {
        match self.attribute(name) {
            Some(value) => value
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| SbmlError::InvalidNumber(value.to_string())),
            None => Ok(None),
        }
    }
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn element_from_start(start: &BytesStart) -> Result<Element, SbmlError> {
    let mut element = Element {
        name: local_name(start.local_name().as_ref()),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute?;
        // Namespace declarations are not needed once names are local
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let value: Cow<str> = attribute.unescape_value()?;
        element.attributes.insert(
            local_name(attribute.key.local_name().as_ref()),
            value.into_owned(),
        );
    }
    Ok(element)
}

fn parse_document(xml: &str) -> Result<Element, SbmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SbmlError::Malformed("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(SbmlError::Malformed("unclosed element".to_string()));
    }
    root.ok_or_else(|| SbmlError::Malformed("empty document".to_string()))
}

fn sbml_model(root: &Element) -> Result<&Element, SbmlError> {
    if root.name != "sbml" {
        return Err(SbmlError::Malformed(format!(
            "root element is {}, expected sbml",
            root.name
        )));
    }
    root.child("model").ok_or(SbmlError::MissingModel)
}

fn model_from_document(root: &Element) -> Result<Model, SbmlError> {
    let sbml = sbml_model(root)?;
    let mut model = Model::new_empty();
    model.id = sbml.attribute("id").map(|s| s.to_string());

    if let Some(compartment) = sbml
        .child("listOfCompartments")
        .and_then(|list| list.child("compartment"))
    {
        model.compartment = Compartment {
            id: compartment.required("id")?,
            size: compartment.number("size")?.unwrap_or(1.0),
        };
    }

    if let Some(list) = sbml.child("listOfParameters") {
        for parameter in list.children_named("parameter") {
            let id = parameter.required("id")?;
            let value = parameter
                .number("value")?
                .ok_or_else(|| SbmlError::MissingAttribute {
                    element: format!("parameter {}", id),
                    attribute: "value".to_string(),
                })?;
            model.set_parameter(&id, value);
        }
    }

    if let Some(list) = sbml.child("listOfSpecies") {
        for element in list.children_named("species") {
            let mut species = read_species(element)?;
            // Species in the model compartment are stored without an explicit one
            if species.compartment.as_deref() == Some(model.compartment.id.as_str()) {
                species.compartment = None;
            }
            debug!(species = %species.id, "read species");
            model.add_species(species);
        }
    }

    if let Some(list) = sbml.child("listOfReactions") {
        for element in list.children_named("reaction") {
            let (reaction, local_parameters) = read_reaction(element)?;
            debug!(reaction = %reaction.id, kind = %reaction.rate_law.kind(), "read reaction");
            for (id, value) in local_parameters {
                model.set_parameter(&id, value);
            }
            model.add_reaction(reaction);
        }
    }

    model.validate()?;
    Ok(model)
}

fn read_species(element: &Element) -> Result<Species, SbmlError> {
    let initial = match element.number("initialConcentration")? {
        Some(value) => value,
        None => element.number("initialAmount")?.unwrap_or(0.0),
    };
    Ok(Species {
        id: element.required("id")?,
        name: element.attribute("name").map(|s| s.to_string()),
        compartment: element.attribute("compartment").map(|s| s.to_string()),
        initial,
    })
}

fn read_species_references(
    element: &Element,
    list: &str,
) -> Result<IndexMap<String, f64>, SbmlError> {
    let mut references = IndexMap::new();
    if let Some(list) = element.child(list) {
        for reference in list.children_named("speciesReference") {
            let species = reference.required("species")?;
            let stoichiometry = reference.number("stoichiometry")?.unwrap_or(1.0);
            *references.entry(species).or_insert(0.0) += stoichiometry;
        }
    }
    Ok(references)
}

/// Read a reaction along with its local parameters, already renamed to `<reaction>_<param>`
fn read_reaction(element: &Element) -> Result<(Reaction, IndexMap<String, f64>), SbmlError> {
    let id = element.required("id")?;
    let kinetic_law = element.child("kineticLaw");

    let mut renames = IndexMap::new();
    let mut local_parameters = IndexMap::new();
    if let Some(kinetic_law) = kinetic_law {
        // Level 3 uses listOfLocalParameters, Level 2 listOfParameters
        let lists = kinetic_law
            .children_named("listOfLocalParameters")
            .chain(kinetic_law.children_named("listOfParameters"));
        for list in lists {
            for parameter in list.children.iter() {
                let name = parameter.required("id")?;
                let global = format!("{}_{}", id, name);
                let value = parameter.number("value")?.unwrap_or(0.0);
                local_parameters.insert(global.clone(), value);
                renames.insert(name, global);
            }
        }
    }

    let annotation = element
        .child("annotation")
        .and_then(|a| a.find_descendant(&["rateLaw", "PropensityType"]));
    let rate_law = match (annotation, kinetic_law) {
        (Some(annotation), _) => RateLaw::from_annotation(&annotation.text)?,
        (None, Some(kinetic_law)) => {
            let math = kinetic_law
                .child("math")
                .and_then(|m| m.children.first())
                .ok_or_else(|| SbmlError::MissingKineticLaw(id.clone()))?;
            RateLaw::General {
                rate: math_to_expr(math)?,
            }
        }
        (None, None) => return Err(SbmlError::MissingKineticLaw(id)),
    };

    let reaction = Reaction {
        reactants: read_species_references(element, "listOfReactants")?,
        products: read_species_references(element, "listOfProducts")?,
        rate_law: rate_law.rename_parameters(&renames),
        name: element.attribute("name").map(|s| s.to_string()),
        id,
    };
    Ok((reaction, local_parameters))
}

fn math_to_expr(element: &Element) -> Result<Expr, SbmlError> {
    match element.name.as_str() {
        "cn" => {
            let text = element.text.trim();
            let value = text
                .parse::<f64>()
                .map_err(|_| SbmlError::InvalidNumber(text.to_string()))?;
            // Literals stay non-negative, the same tree the infix parser builds for `-2`
            if value < 0.0 {
                Ok(Expr::Neg(Box::new(Expr::Number(-value))))
            } else {
                Ok(Expr::Number(value))
            }
        }
        "ci" => Ok(Expr::Symbol(element.text.trim().to_string())),
        "apply" => {
            let (operator, arguments) = element
                .children
                .split_first()
                .ok_or_else(|| SbmlError::UnsupportedMath("empty apply".to_string()))?;
            let mut arguments = arguments
                .iter()
                .map(math_to_expr)
                .collect::<Result<Vec<_>, SbmlError>>()?;
            let binary = |mut arguments: Vec<Expr>| -> Result<(Box<Expr>, Box<Expr>), SbmlError> {
                if arguments.len() != 2 {
                    return Err(SbmlError::UnsupportedMath(format!(
                        "{} with {} arguments",
                        operator.name,
                        arguments.len()
                    )));
                }
                let right = arguments.remove(1);
                let left = arguments.remove(0);
                Ok((Box::new(left), Box::new(right)))
            };
            match operator.name.as_str() {
                "plus" => Ok(match arguments.len() {
                    0 => Expr::Number(0.0),
                    1 => arguments.remove(0),
                    _ => Expr::Add(arguments),
                }),
                "times" => Ok(match arguments.len() {
                    0 => Expr::Number(1.0),
                    1 => arguments.remove(0),
                    _ => Expr::Mul(arguments),
                }),
                "minus" if arguments.len() == 1 => Ok(Expr::Neg(Box::new(arguments.remove(0)))),
                "minus" => binary(arguments).map(|(l, r)| Expr::Sub(l, r)),
                "divide" => binary(arguments).map(|(l, r)| Expr::Div(l, r)),
                "power" => binary(arguments).map(|(l, r)| Expr::Pow(l, r)),
                other => Err(SbmlError::UnsupportedMath(other.to_string())),
            }
        }
        other => Err(SbmlError::UnsupportedMath(other.to_string())),
    }
}
// endregion Reading

#[derive(Debug, Error)]
pub enum SbmlError {
    #[error("Unable to read or write the SBML file")]
    Io(#[from] std::io::Error),
    #[error("Invalid XML")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid XML attribute")]
    Attribute(#[from] AttrError),
    #[error("Malformed SBML document: {0}")]
    Malformed(String),
    #[error("SBML document contains no model")]
    MissingModel,
    #[error("{element} is missing the attribute {attribute}")]
    MissingAttribute { element: String, attribute: String },
    #[error("Invalid number {0}")]
    InvalidNumber(String),
    #[error("Reaction {0} has neither a rate law annotation nor a kinetic law")]
    MissingKineticLaw(String),
    #[error("Unsupported MathML element {0}")]
    UnsupportedMath(String),
    #[error("Invalid rate law")]
    RateLaw(#[from] RateLawError),
    #[error("Invalid rate expression")]
    Expression(#[from] ExprParseError),
    #[error("Invalid model")]
    Model(#[from] ModelError),
}
