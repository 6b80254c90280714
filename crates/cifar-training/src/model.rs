//! ResNet9 architecture for 32x32 CIFAR-10 images.
//!
//! Layout:
//! - prep: 3 -> c
//! - layer1: c -> 2c, maxpool
//! - res1: two 2c -> 2c blocks with a skip connection
//! - layer2: 2c -> 4c, maxpool
//! - layer3: 4c -> 8c, maxpool
//! - res2: two 8c -> 8c blocks with a skip connection
//! - head: 4x4 maxpool, flatten, linear to the class logits
//!
//! with c = 64 by default.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use cifar_core::ModelConfig;

/// Convolution block: 3x3 conv, batch norm, ReLU, optional 2x2 maxpool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    activation: Relu,
    pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Creates a block mapping `in_channels` to `out_channels`
    pub fn new(in_channels: usize, out_channels: usize, pool: bool, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = pool.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init());

        Self {
            conv,
            bn,
            activation: Relu::new(),
            pool,
        }
    }

    /// Forward pass
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.bn.forward(x);
        let x = self.activation.forward(x);
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

/// ResNet9 classifier
#[derive(Module, Debug)]
pub struct ResNet9<B: Backend> {
    prep: ConvBlock<B>,
    layer1: ConvBlock<B>,
    res1_block1: ConvBlock<B>,
    res1_block2: ConvBlock<B>,
    layer2: ConvBlock<B>,
    layer3: ConvBlock<B>,
    res2_block1: ConvBlock<B>,
    res2_block2: ConvBlock<B>,
    head_pool: MaxPool2d,
    fc: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> ResNet9<B> {
    /// Creates the model from its configuration
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let c = config.base_channels;
        let num_classes = config.num_classes;

        let prep = ConvBlock::new(3, c, false, device);
        let layer1 = ConvBlock::new(c, 2 * c, true, device);
        let res1_block1 = ConvBlock::new(2 * c, 2 * c, false, device);
        let res1_block2 = ConvBlock::new(2 * c, 2 * c, false, device);
        let layer2 = ConvBlock::new(2 * c, 4 * c, true, device);
        let layer3 = ConvBlock::new(4 * c, 8 * c, true, device);
        let res2_block1 = ConvBlock::new(8 * c, 8 * c, false, device);
        let res2_block2 = ConvBlock::new(8 * c, 8 * c, false, device);

        // After three 2x2 pools a 32x32 input is 4x4, reduced here to 1x1
        let head_pool = MaxPool2dConfig::new([4, 4]).with_strides([4, 4]).init();
        let fc = LinearConfig::new(8 * c, num_classes).init(device);

        Self {
            prep,
            layer1,
            res1_block1,
            res1_block2,
            layer2,
            layer3,
            res2_block1,
            res2_block2,
            head_pool,
            fc,
            num_classes,
        }
    }

    /// Forward pass producing logits of shape [batch, num_classes]
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.prep.forward(input);
        let x = self.layer1.forward(x);

        // First residual: identity plus two conv blocks
        let r = self.res1_block2.forward(self.res1_block1.forward(x.clone()));
        let x = x + r;

        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);

        // Second residual
        let r = self.res2_block2.forward(self.res2_block1.forward(x.clone()));
        let x = x + r;

        let x = self.head_pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let x = x.reshape([batch, channels]);

        self.fc.forward(x)
    }

    /// Class probabilities via softmax over the logits
    pub fn predict(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(input);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let config = ModelConfig {
            num_classes: 10,
            base_channels: 8,
        };
        let model: ResNet9<TestBackend> = ResNet9::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 10]);
    }

    #[test]
    fn test_predict_is_distribution() {
        let device = Default::default();
        let config = ModelConfig {
            num_classes: 10,
            base_channels: 8,
        };
        let model: ResNet9<TestBackend> = ResNet9::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let probs = model.predict(input).into_data().to_vec::<f32>().unwrap();

        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_conv_block_pooling() {
        let device = Default::default();
        let block: ConvBlock<TestBackend> = ConvBlock::new(3, 8, true, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [1, 8, 16, 16]);
    }

    #[test]
    fn test_has_parameters() {
        let device = Default::default();
        let config = ModelConfig::default();
        let model: ResNet9<TestBackend> = ResNet9::new(&config, &device);
        assert!(model.num_params() > 0);
    }
}
