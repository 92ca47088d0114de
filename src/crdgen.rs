use controller::api::v1alpha1::{
    logparser::LogParser, logpipeline::LogPipeline, metricpipeline::MetricPipeline,
    tracepipeline::TracePipeline,
};
use kube::CustomResourceExt as _;

fn main() {
    print!("{}", serde_yaml::to_string(&LogPipeline::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&LogParser::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&MetricPipeline::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&TracePipeline::crd()).unwrap());
}
