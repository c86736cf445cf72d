/*!
# Saving Traces to CSV

Enable via the `csv` feature.
*/

use std::error::Error;
use std::fs::File;

use csv::Writer;

use crate::trace::Trace;
use crate::value::Value;

/**
Saves a trace as a CSV file, one row per retained sweep.

The header holds `"sweep"` followed by one column per recorded node. A
vector-valued node `v` spans the columns `v_0`, `v_1`, and so on. Integer
values are written without a decimal point.

# Examples

```rust
use mini_pgm::config::RunConfig;
use mini_pgm::distributions::normal_lpdf;
use mini_pgm::graph::Graph;
use mini_pgm::io::csv::save_csv;
use mini_pgm::node::NodeSpec;
use mini_pgm::sampler::Sampler;

let graph = Graph::build(vec![NodeSpec::stochastic("x", &[], 0.0, |v, _| {
    normal_lpdf(v.as_real().unwrap_or(f64::NAN), 0.0, 1.0)
})])?;
let mut sampler = Sampler::new(graph, RunConfig::new(10).set_seed(0))?;
save_csv(sampler.run()?, "/tmp/trace.csv")?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_csv(trace: &Trace, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let columns: Vec<(&str, &[Value])> = trace
        .names()
        .map(|name| trace.get(name).map(|values| (name, values)))
        .collect::<Result<_, _>>()?;

    let mut header = vec!["sweep".to_string()];
    for (name, values) in &columns {
        match values.first() {
            Some(v) if !v.is_scalar() => header.extend((0..v.len()).map(|i| format!("{name}_{i}"))),
            _ => header.push(name.to_string()),
        }
    }
    wtr.write_record(&header)?;

    for (row_idx, sweep) in trace.sweeps().iter().enumerate() {
        let mut row = vec![sweep.to_string()];
        for (_, values) in &columns {
            match &values[row_idx] {
                Value::Real(x) => row.push(x.to_string()),
                Value::Int(k) => row.push(k.to_string()),
                Value::RealVec(xs) => row.extend(xs.iter().map(|x| x.to_string())),
                Value::IntVec(ks) => row.extend(ks.iter().map(|k| k.to_string())),
            }
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
