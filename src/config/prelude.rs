//! Standard functions and node declarations bound into every network description.
//!
//! Node functions only set `operation` in their `new` record; everything else the node
//! constructor reads (`rows`, `inputs` via the record, `tag`, `deviceId`, `precision`) is
//! found through the scope chain, i.e. in the call's arguments or at the top level.

use crate::config::ast::Script;
use crate::config::parser::parse;
use crate::error::Result;

pub const PRELUDE: &str = r#"
# value functions
Print(value, format = '') = new PrintAction [ what = if format == '' then value else Format(value, format) ]
Format(value, format = '') = new StringFunction [ what = 'Format' ; arg = value ; how = format ]
Replace(s, from, to) = new StringFunction [ what = 'Replace' ; arg = s ; replacewhat = from ; withwhat = to ]
Substr(s, begin, num) = new StringFunction [ what = 'Substr' ; arg = s ; pos = begin ; chars = num ]
Chr(c) = new StringFunction [ what = 'Chr' ; arg = c ]
Floor(x) = new NumericFunction [ what = 'Floor' ; arg = x ]
Length(x) = new NumericFunction [ what = 'Length' ; arg = x ]
Ceil(x) = -Floor(-x)
Round(x) = Floor(x + 0.5)
Abs(x) = if x >= 0 then x else -x
Sign(x) = if x > 0 then 1 else if x < 0 then -1 else 0
Min(a, b) = if a < b then a else b
Max(a, b) = if a > b then a else b
Fac(n) = if n > 1 then Fac(n - 1) * n else 1

# leaves
Parameter(rows, cols, needGradient = true, init = 'uniform', initValueScale = 1, value = 0, initFromFilePath = '', tag = '') = new ComputationNode [ operation = 'LearnableParameter' ]
Input(rows, cols = 1, tag = '') = new ComputationNode [ operation = 'Input' ]
Feature(rows, cols = 1, tag = 'feature') = new ComputationNode [ operation = 'Input' ]
Label(rows, cols = 1, tag = 'label') = new ComputationNode [ operation = 'Input' ]

# statistics and slicing
Mean(z, tag = '') = new ComputationNode [ operation = 'Mean' ; inputs = z ]
InvStdDev(z, tag = '') = new ComputationNode [ operation = 'InvStdDev' ; inputs = z ]
PerDimMeanVarNormalization(feat, mean, invStdDev, tag = '') = new ComputationNode [ operation = 'PerDimMeanVarNormalization' ; inputs = feat : mean : invStdDev ]
RowSlice(firstRow, rows, features, tag = '') = new ComputationNode [ operation = 'RowSlice' ; first = firstRow ; num = rows ; inputs = features ]

# recurrence: the input is only evaluated once the network has registered this node
Delay(in, delay = 1, tag = '') = new ComputationNode [ operation = 'Delay' ; input = in ; deltaT = -delay ]

# element-wise
Sigmoid(z, tag = '') = new ComputationNode [ operation = 'Sigmoid' ; inputs = z ]
Tanh(z, tag = '') = new ComputationNode [ operation = 'Tanh' ; inputs = z ]
RectifiedLinear(z, tag = '') = new ComputationNode [ operation = 'RectifiedLinear' ; inputs = z ]
Log(z, tag = '') = new ComputationNode [ operation = 'Log' ; inputs = z ]
Exp(z, tag = '') = new ComputationNode [ operation = 'Exp' ; inputs = z ]
Softmax(z, tag = '') = new ComputationNode [ operation = 'Softmax' ; inputs = z ]
Negate(z, tag = '') = new ComputationNode [ operation = 'Negate' ; inputs = z ]

# binary
Plus(a, b, tag = '') = new ComputationNode [ operation = 'Plus' ; inputs = a : b ]
Minus(a, b, tag = '') = new ComputationNode [ operation = 'Minus' ; inputs = a : b ]
Times(a, b, tag = '') = new ComputationNode [ operation = 'Times' ; inputs = a : b ]
ElementTimes(a, b, tag = '') = new ComputationNode [ operation = 'ElementTimes' ; inputs = a : b ]

# training criteria
CrossEntropyWithSoftmax(labels, z, tag = 'criterion') = new ComputationNode [ operation = 'CrossEntropyWithSoftmax' ; inputs = labels : z ]
SquareError(labels, z, tag = '') = new ComputationNode [ operation = 'SquareError' ; inputs = labels : z ]
ErrorPrediction(labels, z, tag = '') = new ComputationNode [ operation = 'ErrorPrediction' ; inputs = labels : z ]

# layers
BFF(in, rows, cols) = [ W = Parameter(rows, cols) ; B = Parameter(rows, 1, init = 'fixedValue', value = 0) ; z = W * in + B ]
SBFF(in, rows, cols) = [ B = BFF(in, rows, cols) ; Eh = Sigmoid(B.z) ]
MeanVarNorm(feat) = PerDimMeanVarNormalization(feat, Mean(feat), InvStdDev(feat))
LogPrior(labels) = Log(Mean(labels))
"#;

/// Parse the standard prelude.
pub fn standard() -> Result<Script> {
    parse(PRELUDE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeKind;

    #[test]
    fn prelude_parses_and_covers_the_node_catalog() {
        let script = standard().unwrap();
        let names: Vec<&str> = script.members.iter().map(|m| m.name()).collect();
        for kind in NodeKind::ALL {
            let declared = match kind {
                NodeKind::LearnableParameter => "Parameter",
                other => other.as_str(),
            };
            assert!(names.contains(&declared), "no prelude function for {}", kind);
        }
        for name in ["Print", "Format", "Feature", "Label", "BFF", "SBFF", "MeanVarNorm", "LogPrior"] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }
}
