//! Aperture macro body parser (spec §3.4, §4.2).
//!
//! The arithmetic sublanguage is recursive and has real operator
//! precedence, which is exactly the shape nom's combinators were built
//! for — generalised from the teacher's `parsing/gerber.rs`
//! `macro_expression`/`macro_term`/`macro_factor` functions to the full
//! primitive set this crate implements.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{map, map_res, opt, recognize};
use nom::multi::separated_list1;
use nom::number::complete::recognize_float;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

use crate::aperture::{ApertureMacro, MacroContent, MacroExpression};

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, str::parse)(input)
}

fn variable(input: &str) -> IResult<&str, u32> {
    preceded(char('$'), map_res(digit1, str::parse))(input)
}

fn factor(input: &str) -> IResult<&str, MacroExpression> {
    ws(alt((
        map(preceded(char('-'), factor), |e| MacroExpression::Negate(Box::new(e))),
        delimited(char('('), expression, char(')')),
        map(variable, MacroExpression::Variable),
        map(number, MacroExpression::Constant),
    )))(input)
}

fn term(input: &str) -> IResult<&str, MacroExpression> {
    let (input, first) = factor(input)?;
    let (input, rest) = nom::multi::many0(pair(ws(alt((char('x'), char('X'), char('/')))), factor))(input)?;
    Ok((
        input,
        rest.into_iter().fold(first, |acc, (op, rhs)| match op {
            '/' => MacroExpression::Divide(Box::new(acc), Box::new(rhs)),
            _ => MacroExpression::Multiply(Box::new(acc), Box::new(rhs)),
        }),
    ))
}

fn expression(input: &str) -> IResult<&str, MacroExpression> {
    let (input, first) = term(input)?;
    let (input, rest) = nom::multi::many0(pair(ws(alt((char('+'), char('-')))), term))(input)?;
    Ok((
        input,
        rest.into_iter().fold(first, |acc, (op, rhs)| match op {
            '+' => MacroExpression::Add(Box::new(acc), Box::new(rhs)),
            _ => MacroExpression::Subtract(Box::new(acc), Box::new(rhs)),
        }),
    ))
}

fn parse_expression(text: &str) -> Result<MacroExpression, String> {
    expression(text.trim())
        .map(|(_, expr)| expr)
        .map_err(|err| format!("malformed macro expression \"{text}\": {err}"))
}

fn comma_fields(text: &str) -> Vec<&str> {
    text.split(',').map(str::trim).collect()
}

fn field_expr(fields: &[&str], index: usize) -> Result<MacroExpression, String> {
    fields
        .get(index)
        .ok_or_else(|| format!("macro primitive missing field {index}"))
        .and_then(|text| parse_expression(text))
}

fn is_exposure_on(fields: &[&str], index: usize) -> Result<MacroExpression, String> {
    field_expr(fields, index)
}

/// Parse one `AM` statement body (a sequence of `;`-less comment lines and
/// `N,a,b,c*` primitive lines already split by the caller on `*`) into an
/// [`ApertureMacro`].
pub fn parse_macro_body(name: &str, primitives: &[&str]) -> Result<ApertureMacro, String> {
    let mut content = Vec::with_capacity(primitives.len());
    for primitive in primitives {
        let primitive = primitive.trim();
        if primitive.is_empty() {
            continue;
        }
        content.push(parse_primitive(primitive)?);
    }
    Ok(ApertureMacro {
        name: name.to_string(),
        content,
    })
}

fn parse_primitive(text: &str) -> Result<MacroContent, String> {
    if let Some(rest) = text.strip_prefix('$') {
        let (var_str, expr_str) = rest.split_once('=').ok_or_else(|| format!("malformed variable definition \"{text}\""))?;
        let variable: u32 = var_str.trim().parse().map_err(|_| format!("bad variable number in \"{text}\""))?;
        return Ok(MacroContent::VariableDefinition {
            variable,
            expression: parse_expression(expr_str)?,
        });
    }

    let fields = comma_fields(text);
    let code = fields.first().ok_or_else(|| "empty macro primitive".to_string())?;

    match *code {
        "0" => Ok(MacroContent::Comment),
        "1" => Ok(MacroContent::Circle {
            exposure: is_exposure_on(&fields, 1)?,
            diameter: field_expr(&fields, 2)?,
            center: (field_expr(&fields, 3)?, field_expr(&fields, 4)?),
            rotation: fields.get(5).map(|_| field_expr(&fields, 5)).transpose()?.unwrap_or(MacroExpression::Constant(0.0)),
        }),
        "20" => Ok(MacroContent::VectorLine {
            exposure: is_exposure_on(&fields, 1)?,
            width: field_expr(&fields, 2)?,
            start: (field_expr(&fields, 3)?, field_expr(&fields, 4)?),
            end: (field_expr(&fields, 5)?, field_expr(&fields, 6)?),
            rotation: field_expr(&fields, 7)?,
        }),
        "21" => Ok(MacroContent::CenterLine {
            exposure: is_exposure_on(&fields, 1)?,
            size: (field_expr(&fields, 2)?, field_expr(&fields, 3)?),
            center: (field_expr(&fields, 4)?, field_expr(&fields, 5)?),
            rotation: field_expr(&fields, 6)?,
        }),
        "4" => {
            // Field layout: 4,exposure,n,x1,y1,x2,y2,...,x(n+1),y(n+1),rotation*
            // n is the vertex count excluding the repeated closing point.
            let exposure = field_expr(&fields, 1)?;
            let vertex_count: usize = fields
                .get(2)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| format!("malformed outline vertex count in \"{text}\""))? as usize;
            let mut points = Vec::with_capacity(vertex_count + 1);
            let mut idx = 3;
            for _ in 0..=vertex_count {
                points.push((field_expr(&fields, idx)?, field_expr(&fields, idx + 1)?));
                idx += 2;
            }
            let rotation = field_expr(&fields, idx)?;
            Ok(MacroContent::Outline {
                exposure,
                points,
                rotation,
            })
        }
        "5" => Ok(MacroContent::Polygon {
            exposure: is_exposure_on(&fields, 1)?,
            vertices: field_expr(&fields, 2)?,
            center: (field_expr(&fields, 3)?, field_expr(&fields, 4)?),
            diameter: field_expr(&fields, 5)?,
            rotation: field_expr(&fields, 6)?,
        }),
        "6" => Ok(MacroContent::Thermal {
            center: (field_expr(&fields, 1)?, field_expr(&fields, 2)?),
            outer_diameter: field_expr(&fields, 3)?,
            inner_diameter: field_expr(&fields, 4)?,
            gap_thickness: field_expr(&fields, 5)?,
            rotation: field_expr(&fields, 6)?,
        }),
        other => Err(format!("unknown macro primitive code \"{other}\" in \"{text}\"")),
    }
}

/// Parse the comma-separated instantiation parameters of an `ADDnnMACRO`
/// statement's trailing `,p1,p2,...` list.
pub fn parse_instance_parameters(text: &str) -> Result<Vec<f64>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    separated_list1(ws(char(',')), number)(text.trim())
        .map(|(_, values)| values)
        .map_err(|err| format!("malformed aperture macro parameters \"{text}\": {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_circle_primitive() {
        let macro_def = parse_macro_body("DONUT", &["1,1,0.5,0,0"]).unwrap();
        assert_eq!(macro_def.content.len(), 1);
        match &macro_def.content[0] {
            MacroContent::Circle { diameter, .. } => {
                assert_eq!(diameter.evaluate(&HashMap::new()).unwrap(), 0.5);
            }
            other => panic!("expected circle, got {other:?}"),
        }
    }

    #[test]
    fn parses_variable_definition_and_arithmetic() {
        let macro_def = parse_macro_body("VAR", &["$1=$2+1X2"]).unwrap();
        match &macro_def.content[0] {
            MacroContent::VariableDefinition { variable, expression } => {
                assert_eq!(*variable, 1);
                let mut vars = HashMap::new();
                vars.insert(2, 3.0);
                assert_eq!(expression.evaluate(&vars).unwrap(), 8.0);
            }
            other => panic!("expected variable definition, got {other:?}"),
        }
    }

    #[test]
    fn parses_instance_parameters() {
        let params = parse_instance_parameters("0.5,1.0,-2.25").unwrap();
        assert_eq!(params, vec![0.5, 1.0, -2.25]);
    }
}
